use super::{adopt_location, EXIT_SUCCESS};
use stager_client::StagingClient;

// A failing operation has already reported and exited through the client's
// host; the `Err` arms below only matter for hosts that return.

pub fn download(client: &StagingClient) -> Result<u8, String> {
    let bytes = client.download().map_err(|e| e.to_string())?;
    client.output(&format!(
        "downloaded {} ({bytes} bytes)",
        client.config().pkg_path.display()
    ));
    Ok(EXIT_SUCCESS)
}

pub fn extract(client: &mut StagingClient, location: &str) -> Result<u8, String> {
    let dir = client.extract(location).map_err(|e| e.to_string())?;
    client.output(&format!("extracted into {}", dir.display()));
    Ok(EXIT_SUCCESS)
}

pub fn exec(client: &StagingClient, command: &[String]) -> Result<u8, String> {
    client
        .execute(&command.join(" "))
        .map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}

pub fn exec_app(
    client: &mut StagingClient,
    location: &str,
    command: &[String],
) -> Result<u8, String> {
    adopt_location(client, location)?;
    client
        .execute_app(&command.join(" "))
        .map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}

pub fn upload(client: &mut StagingClient, location: &str) -> Result<u8, String> {
    adopt_location(client, location)?;
    let sha1 = client.upload().map_err(|e| e.to_string())?;
    client.output(&format!("uploaded (sha1 {sha1})"));
    Ok(EXIT_SUCCESS)
}

pub fn complete(client: &mut StagingClient, location: &str) -> Result<u8, String> {
    adopt_location(client, location)?;
    client.complete().map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}
