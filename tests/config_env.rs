use modular_di::{ContainerConfig, DiError, DiResult, Resolver, Scope, ScopeManager};
use serial_test::serial;
use std::env;

const VARS: [&str; 5] = [
    "MODULAR_DI_ALLOW_OVERRIDE",
    "MODULAR_DI_MAX_DEPTH",
    "MODULAR_DI_NO_PARENT_BINDS",
    "MODULAR_DI_CORE_TAG",
    "MODULAR_DI_INNER_TAG",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_env() {
    clear_env();
    let config = ContainerConfig::from_env().unwrap();
    assert_eq!(config, ContainerConfig::default());
    assert!(config.allow_override);
    assert_eq!(config.max_depth, 1024);
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    env::set_var("MODULAR_DI_ALLOW_OVERRIDE", "false");
    env::set_var("MODULAR_DI_MAX_DEPTH", "32");
    env::set_var("MODULAR_DI_CORE_TAG", "platform");
    env::set_var("MODULAR_DI_INNER_TAG", "shop");

    let config = ContainerConfig::from_env().unwrap();
    clear_env();

    assert!(!config.allow_override);
    assert_eq!(config.max_depth, 32);
    assert!(!config.no_parent_binds);
    assert_eq!(config.core_tag, "platform");
    assert_eq!(config.inner_tag, "shop");
}

#[test]
#[serial]
fn test_invalid_env_value() {
    clear_env();
    env::set_var("MODULAR_DI_MAX_DEPTH", "deep");
    let result = ContainerConfig::from_env();
    clear_env();

    match result {
        Err(DiError::InvalidConfig { key, .. }) => assert_eq!(key, "MODULAR_DI_MAX_DEPTH"),
        other => panic!("expected InvalidConfig, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_env_config_drives_manager() {
    clear_env();
    env::set_var("MODULAR_DI_ALLOW_OVERRIDE", "no");
    env::set_var("MODULAR_DI_INNER_TAG", "app");
    let config = ContainerConfig::from_env().unwrap();
    clear_env();

    let mut manager = ScopeManager::new(|scope: &Scope| -> DiResult<()> {
        scope.add_instance(1u8)?;
        scope.add_instance(2u8)?;
        Ok(())
    })
    .with_config(config);

    assert!(matches!(manager.initialize(), Err(DiError::DuplicateRegistration("u8"))));
    assert!(!manager.is_initialized());
}

#[test]
#[serial]
fn test_tags_flow_into_scopes() {
    let mut manager = ScopeManager::new(|scope: &Scope| -> DiResult<()> {
        scope.add_instance("hello")?;
        Ok(())
    })
    .with_config(ContainerConfig::default().core_tag("platform").inner_tag("shop"));

    manager.initialize().unwrap();
    assert_eq!(manager.injector().unwrap().tag(), "platform");
    assert_eq!(manager.inner_injector().unwrap().tag(), "shop");
    assert_eq!(*manager.get::<&'static str>().unwrap(), "hello");
    assert_eq!(manager.inner_injector().unwrap().get::<&'static str>().map(|s| *s).unwrap(), "hello");
}

#[cfg(feature = "config")]
#[test]
fn test_json_config() {
    let config = ContainerConfig::from_json_str(r#"{ "allow_override": false, "inner_tag": "shop" }"#).unwrap();
    assert!(!config.allow_override);
    assert_eq!(config.inner_tag, "shop");
    assert_eq!(config.core_tag, "core");

    assert!(matches!(
        ContainerConfig::from_json_str(r#"{ "max_depth": "deep" }"#),
        Err(DiError::InvalidConfig { .. })
    ));
}
