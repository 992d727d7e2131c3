use super::EXIT_SUCCESS;
use stager_client::StagingClient;

pub fn snapshot(client: &StagingClient) -> Result<u8, String> {
    client.snapshot().map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}

pub fn done(client: &StagingClient) -> Result<u8, String> {
    client.done().map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}

pub fn relaunch(client: &StagingClient) -> Result<u8, String> {
    client.relaunch().map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}

/// Never returns under the process host.
pub fn fail(client: &StagingClient, message: Option<&str>) -> Result<u8, String> {
    match message {
        Some(msg) => client.fail(Some(&msg)),
        None => client.fail(None),
    }
    Ok(super::EXIT_FAILURE)
}
