//! Activation, deactivation, and settings round trips.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pta_core::App;
use pta_core::settings::{DEFAULT_CITY_NAME, Settings, TranslationProviderKind, keys};
use pta_core::store::{CapabilitySet, RoleStore};
use pta_test_utils::{MemoryStores, init_tracing};
use serde_json::json;

fn build_app(mem: &MemoryStores) -> App {
    init_tracing();
    App::new(mem.stores()).unwrap()
}

#[tokio::test]
async fn activation_registers_roles_and_seeds_defaults() {
    let mem = MemoryStores::new();
    let app = build_app(&mem);

    app.activate().await.unwrap();

    assert_eq!(
        mem.roles.role_names(),
        vec![
            "pta_block_officer",
            "pta_city_director",
            "pta_city_executive",
            "pta_city_officer",
            "pta_pr_committee",
            "pta_project_committee",
            "pta_school_officer",
            "pta_sys_admin",
        ]
    );

    let settings = app.settings().await.unwrap();
    assert_eq!(settings.city_name, DEFAULT_CITY_NAME);
    assert_eq!(settings.blocks.len(), 10);
    assert_eq!(settings.blocks[0], "ward-1");
    assert_eq!(settings.blocks[9], "ward-10");
    assert_eq!(settings.translation_provider, TranslationProviderKind::MyMemory);
    assert!(settings.ascii_fallback);
    assert!(settings.charset_conversion_enabled);
}

#[tokio::test]
async fn reactivation_preserves_operator_customizations() {
    let mem = MemoryStores::new();
    mem.variables.seed(keys::CITY_NAME, json!("横浜市"));
    mem.variables.seed(keys::BLOCKS, json!(["north", "south"]));

    let app = build_app(&mem);
    app.activate().await.unwrap();
    app.activate().await.unwrap();

    let settings = app.settings().await.unwrap();
    assert_eq!(settings.city_name, "横浜市");
    assert_eq!(settings.blocks, vec!["north", "south"]);
    assert_eq!(mem.roles.role_names().len(), 8);
}

#[tokio::test]
async fn deactivation_removes_roles_but_keeps_settings() {
    let mem = MemoryStores::new();
    let app = build_app(&mem);

    app.activate().await.unwrap();
    app.deactivate().await.unwrap();

    assert!(mem.roles.role_names().is_empty());
    let settings = app.settings().await.unwrap();
    assert_eq!(settings.blocks.len(), 10);
}

#[tokio::test]
async fn saved_block_names_are_normalized() {
    let mem = MemoryStores::new();
    let app = build_app(&mem);

    let settings = Settings {
        blocks: vec![
            "Ward 1".to_string(),
            "ward-1".to_string(),
            "  ".to_string(),
            "第2区".to_string(),
        ],
        ..Settings::default()
    };
    app.update_settings(&settings).await.unwrap();

    let saved = app.settings().await.unwrap();
    assert_eq!(saved.blocks, vec!["ward-1", "第2区"]);
}

#[tokio::test]
async fn role_capabilities_copy_the_base_role() {
    let mem = MemoryStores::new();
    let mut editor_caps = CapabilitySet::new();
    editor_caps.insert("edit_posts".to_string(), true);
    editor_caps.insert("edit_pages".to_string(), true);
    mem.roles
        .create("editor", "Editor", editor_caps)
        .await
        .unwrap();

    let app = build_app(&mem);
    app.activate().await.unwrap();

    let caps = mem
        .roles
        .capabilities("pta_block_officer")
        .await
        .unwrap()
        .expect("role registered");
    assert_eq!(caps.get("edit_posts"), Some(&true));
    assert_eq!(caps.get("edit_pages"), Some(&true));

    let school = mem
        .roles
        .capabilities("pta_school_officer")
        .await
        .unwrap()
        .expect("role registered");
    assert_eq!(school.get("read_private_pages"), Some(&true));
    assert_eq!(school.get("read_private_posts"), Some(&true));
}
