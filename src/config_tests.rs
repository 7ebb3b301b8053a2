use super::*;

#[test]
fn defaults_match_documented_values() {
    let cfg = GatewayConfig::default();
    assert_eq!(cfg.http_port, 5000);
    assert_eq!(cfg.chunk_size, 100_000);
    assert_eq!(cfg.bind_addr, "0.0.0.0");
    assert_eq!(cfg.verifier, VerifierMode::Static);
    assert!(cfg.validate().is_ok());
}

#[test]
fn partial_json_fills_defaults() {
    let cfg = GatewayConfig::from_json_str(
        r#"{
            "http_port": 8080,
            "verifier": "none",
            "policy": { "Alice": ["/data/**/*.parquet"] }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.http_port, 8080);
    assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
    assert_eq!(cfg.verifier, VerifierMode::NoValidation);
    assert_eq!(cfg.policy["Alice"], vec!["/data/**/*.parquet".to_string()]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn malformed_json_is_config_error() {
    let err = GatewayConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, AppError::Config { .. }));
    let err = GatewayConfig::from_json_str(r#"{"verifier":"ldap"}"#).unwrap_err();
    assert_eq!(err.code_str(), "bad_config");
}

#[test]
fn validation_rejects_bad_values() {
    let mut cfg = GatewayConfig { chunk_size: 0, ..Default::default() };
    assert_eq!(cfg.validate().unwrap_err().code_str(), "bad_chunk_size");

    cfg.chunk_size = 10;
    cfg.bind_addr = "not-an-ip".into();
    assert_eq!(cfg.validate().unwrap_err().code_str(), "bad_bind_addr");

    cfg.bind_addr = "127.0.0.1".into();
    cfg.policy.insert("alice".into(), vec!["relative/**".into()]);
    assert_eq!(cfg.validate().unwrap_err().code_str(), "bad_policy_pattern");

    cfg.policy.clear();
    cfg.allowed_identities = Some(vec!["alice".into(), " ".into()]);
    assert_eq!(cfg.validate().unwrap_err().code_str(), "bad_allow_list");
}

#[test]
fn overrides_layer_file_then_env_then_cli() {
    let mut cfg = GatewayConfig::from_json_str(r#"{"http_port": 7000, "chunk_size": 50}"#).unwrap();
    let env = ConfigOverrides::from_lookup(|k| match k {
        "TABLEGATE_HTTP_PORT" => Some("7100".into()),
        "TABLEGATE_CHUNK_SIZE" => Some("nope".into()),
        "TABLEGATE_BIND" => Some("127.0.0.1".into()),
        _ => None,
    });
    let cli = ConfigOverrides { http_port: Some(7200), ..Default::default() };
    cfg.apply(&env.merge(cli));
    assert_eq!(cfg.http_port, 7200);
    assert_eq!(cfg.chunk_size, 50);
    assert_eq!(cfg.bind_addr, "127.0.0.1");
    assert_eq!(cfg.socket_addr().unwrap().to_string(), "127.0.0.1:7200");
}

#[test]
fn load_reads_file_and_reports_missing() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("gateway.json");
    std::fs::write(&path, r#"{"chunk_size": 3, "audit_log": "/var/log/tablegate/audit.jsonl"}"#).unwrap();
    let cfg = GatewayConfig::load(&path).unwrap();
    assert_eq!(cfg.chunk_size, 3);
    assert_eq!(cfg.audit_log, Some(PathBuf::from("/var/log/tablegate/audit.jsonl")));

    let err = GatewayConfig::load(&tmp.path().join("missing.json")).unwrap_err();
    assert_eq!(err.code_str(), "config_unreadable");
}

#[test]
fn base_dir_is_canonical() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = GatewayConfig { base_dir: Some(tmp.path().join("a/..")), ..Default::default() };
    std::fs::create_dir(tmp.path().join("a")).unwrap();
    assert_eq!(cfg.resolved_base_dir().unwrap(), std::fs::canonicalize(tmp.path()).unwrap());

    let cfg = GatewayConfig { base_dir: Some(tmp.path().join("missing")), ..Default::default() };
    assert_eq!(cfg.resolved_base_dir().unwrap_err().code_str(), "bad_base_dir");
}
