use std::io::Write;

use alloy_primitives::address;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use super::{load_config_with_lookup, ConfigError};
use crate::PrivateKeySource;

const MINIMAL_CONFIG: &str = r#"
home_rpc_url = "http://localhost:8545"
foreign_rpc_url = "http://localhost:8546"
home_bridge_contract_address = "0x2946259E0334f33A064106302415aD3391BeD384"
foreign_bridge_contract_address = "0xF70faB01B065eb1CDA7AD7b78C1712d59d8dcFf2"
foreign_chain_token_contract_address = "0xF2E246BB76DF876Cef8b38ae84130F4F55De395b"
validator_private_key = "0x0000000000000000000000000000000000000000000000000000000000000001"
home_chain_max_reorg_depth = 5
foreign_chain_max_reorg_depth = 10
"#;

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("failed to create temp config file");
    file.write_all(contents.as_bytes()).expect("failed to write temp config file");
    file
}

fn no_env(_key: &str) -> Option<String> {
    None
}

#[test]
fn loads_minimal_config_with_defaults() {
    let file = config_file(MINIMAL_CONFIG);
    let config = load_config_with_lookup(Some(file.path()), no_env)
        .expect("minimal config should load");

    assert_eq!(config.home_rpc_timeout, 180);
    assert_eq!(config.foreign_rpc_timeout, 180);
    assert_eq!(config.home_chain_event_poll_interval, 5);
    assert_eq!(config.home_chain_event_fetch_start_block_number, 0);
    assert_eq!(config.home_chain_max_reorg_depth, 5);
    assert_eq!(config.foreign_chain_max_reorg_depth, 10);
    assert_eq!(
        config.home_bridge_contract_address,
        address!("2946259E0334f33A064106302415aD3391BeD384")
    );
    assert_eq!(config.logging.level, None);
    assert_matches!(config.validator_private_key, PrivateKeySource::Raw(_));
}

#[test]
fn environment_variables_override_file_values() {
    let file = config_file(MINIMAL_CONFIG);
    let config = load_config_with_lookup(Some(file.path()), |key| match key {
        "HOME_CHAIN_MAX_REORG_DEPTH" => Some("42".to_owned()),
        "HOME_RPC_URL" => Some("http://10.0.0.1:8545".to_owned()),
        _ => None,
    })
    .expect("config with env overrides should load");

    assert_eq!(config.home_chain_max_reorg_depth, 42);
    assert_eq!(config.home_rpc_url.as_str(), "http://10.0.0.1:8545/");
}

#[test]
fn environment_alone_is_a_valid_source() {
    let config = load_config_with_lookup(None, |key| match key {
        "HOME_RPC_URL" => Some("http://localhost:8545".to_owned()),
        "FOREIGN_RPC_URL" => Some("http://localhost:8546".to_owned()),
        "HOME_BRIDGE_CONTRACT_ADDRESS" => {
            Some("0x2946259E0334f33A064106302415aD3391BeD384".to_owned())
        }
        "FOREIGN_BRIDGE_CONTRACT_ADDRESS" => {
            Some("0xF70faB01B065eb1CDA7AD7b78C1712d59d8dcFf2".to_owned())
        }
        "FOREIGN_CHAIN_TOKEN_CONTRACT_ADDRESS" => {
            Some("0xF2E246BB76DF876Cef8b38ae84130F4F55De395b".to_owned())
        }
        "VALIDATOR_PRIVATE_KEY" => Some(
            "0x0000000000000000000000000000000000000000000000000000000000000001".to_owned(),
        ),
        "HOME_CHAIN_MAX_REORG_DEPTH" => Some("5".to_owned()),
        "FOREIGN_CHAIN_MAX_REORG_DEPTH" => Some("5".to_owned()),
        _ => None,
    })
    .expect("env-only config should load");

    assert_eq!(config.foreign_rpc_url.as_str(), "http://localhost:8546/");
}

#[test]
fn missing_required_key_is_rejected() {
    let file = config_file(&MINIMAL_CONFIG.replace("home_rpc_url", "commented_out"));
    let result = load_config_with_lookup(Some(file.path()), no_env);
    assert_matches!(result, Err(ConfigError::Toml(_)));
}

#[test]
fn unknown_key_is_rejected() {
    let contents = format!("{MINIMAL_CONFIG}\nhome_chain_gas = 1\n");
    let file = config_file(&contents);
    let result = load_config_with_lookup(Some(file.path()), no_env);
    assert_matches!(result, Err(ConfigError::Toml(_)));
}

#[test]
fn zero_poll_interval_is_rejected() {
    let contents = format!("{MINIMAL_CONFIG}\nhome_chain_event_poll_interval = 0\n");
    let file = config_file(&contents);
    let result = load_config_with_lookup(Some(file.path()), no_env);
    assert_matches!(result, Err(ConfigError::Validation(_)));
}

#[test]
fn keystore_source_parses_from_a_table() {
    let contents = format!(
        "{}\nvalidator_private_key = {{ keystore_path = \"keys/keystore.json\", \
         keystore_password_path = \"keys/password\" }}\n",
        MINIMAL_CONFIG.replace(
            "validator_private_key = \
             \"0x0000000000000000000000000000000000000000000000000000000000000001\"",
            ""
        )
    );
    let file = config_file(&contents);
    let config = load_config_with_lookup(Some(file.path()), no_env)
        .expect("keystore key source should parse");
    assert_matches!(config.validator_private_key, PrivateKeySource::Keystore { .. });
}

#[test]
fn logging_table_tolerates_unknown_keys() {
    let contents = format!("{MINIMAL_CONFIG}\n[logging]\nlevel = \"debug\"\nformat = \"json\"\n");
    let file = config_file(&contents);
    let config = load_config_with_lookup(Some(file.path()), no_env)
        .expect("config with logging table should load");
    assert_eq!(config.logging.level.as_deref(), Some("debug"));
}
