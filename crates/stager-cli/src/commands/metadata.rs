use super::{json_pretty, EXIT_SUCCESS};
use crate::{EnvAction, ResourceAction, TemplateAction};
use stager_client::StagingClient;

pub fn show(client: &StagingClient) -> Result<u8, String> {
    let doc = client.meta().map_err(|e| e.to_string())?;
    println!("{}", json_pretty(&doc)?);
    Ok(EXIT_SUCCESS)
}

pub fn env(client: &StagingClient, action: &EnvAction) -> Result<u8, String> {
    match action {
        EnvAction::Add { key, value } => client.environment_add(key, value),
        EnvAction::Remove { key } => client.environment_remove(key),
    }
    .map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}

pub fn provides(client: &StagingClient, action: &ResourceAction) -> Result<u8, String> {
    match action {
        ResourceAction::Add { kind, name } => client.provides_add(kind, name),
        ResourceAction::Remove { kind, name } => client.provides_remove(kind, name),
    }
    .map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}

pub fn deps(client: &StagingClient, action: &ResourceAction) -> Result<u8, String> {
    let (changed, verb, kind, name) = match action {
        ResourceAction::Add { kind, name } => {
            (client.dependencies_add(kind, name), "added", kind, name)
        }
        ResourceAction::Remove { kind, name } => {
            (client.dependencies_remove(kind, name), "removed", kind, name)
        }
    };
    if changed.map_err(|e| e.to_string())? {
        client.output(&format!("{verb} dependency {kind}:{name}"));
    } else {
        client.output(&format!("dependency {kind}:{name} unchanged"));
    }
    Ok(EXIT_SUCCESS)
}

pub fn templates(client: &StagingClient, action: &TemplateAction) -> Result<u8, String> {
    match action {
        TemplateAction::Add { path, left, right } => {
            client.templates_add(path, left.as_deref(), right.as_deref())
        }
        TemplateAction::Remove { path, left, right } => {
            client.templates_remove(path, left.as_deref(), right.as_deref())
        }
    }
    .map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}

pub fn start_command(client: &StagingClient, set: Option<&str>) -> Result<u8, String> {
    if let Some(value) = set {
        client.set_start_command(value).map_err(|e| e.to_string())?;
    } else {
        let current = client.start_command().map_err(|e| e.to_string())?;
        println!("{}", current.unwrap_or_default());
    }
    Ok(EXIT_SUCCESS)
}

pub fn start_path(client: &StagingClient, set: Option<&str>) -> Result<u8, String> {
    if let Some(value) = set {
        client.set_start_path(value).map_err(|e| e.to_string())?;
    } else {
        let current = client.start_path().map_err(|e| e.to_string())?;
        println!("{}", current.unwrap_or_default());
    }
    Ok(EXIT_SUCCESS)
}
