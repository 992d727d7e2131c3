//! Construction reads `STAGER_URL`, so these checks live in their own test
//! binary and run as one sequential test.

use stager_client::{ClientConfig, StagerError, StagingClient, STAGER_URL_ENV};

#[test]
fn coordinator_url_sources() {
    std::env::remove_var(STAGER_URL_ENV);
    assert!(matches!(
        StagingClient::from_env(),
        Err(StagerError::Configuration)
    ));
    assert!(matches!(
        ClientConfig::new(None),
        Err(StagerError::Configuration)
    ));

    let client = StagingClient::new(ClientConfig::new(Some("http://example.com")).unwrap());
    assert_eq!(client.stager_url(), "http://example.com");
    assert!(client.app_path().is_none());

    std::env::set_var(STAGER_URL_ENV, "http://env.example.com");
    let client = StagingClient::from_env().unwrap();
    assert_eq!(client.stager_url(), "http://env.example.com");
    assert_eq!(
        client.config().pkg_path,
        std::path::PathBuf::from("/tmp/pkg.tar.gz")
    );

    let explicit = ClientConfig::new(Some("http://explicit.example.com")).unwrap();
    assert_eq!(explicit.stager_url, "http://explicit.example.com");

    std::env::remove_var(STAGER_URL_ENV);
}
