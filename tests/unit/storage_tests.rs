/*!
 * Tests for persistence backends and settings
 */

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

use subtx::app_config::Config;
use subtx::storage::{KeyValueStore, MemoryStore, Settings, SqliteStore};
use subtx::translation::GlossaryIndex;

use crate::common;

#[test]
fn test_sqliteStore_glossary_shouldSurviveReopen() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let db_path = temp_dir.path().join("subtx.db");

    {
        let store = Arc::new(SqliteStore::open(&db_path, "subtitle_translator_")?);
        let mut glossary = GlossaryIndex::load(store);
        glossary.merge_new(&BTreeMap::from([("Rome".to_string(), "罗马".to_string())]));
    }

    let reopened = Arc::new(SqliteStore::open(&db_path, "subtitle_translator_")?);
    let glossary = GlossaryIndex::load(reopened.clone());

    assert_eq!(glossary.get("Rome"), Some("罗马"));
    assert_eq!(reopened.get("proper_nouns")?.as_deref(), Some(r#"{"Rome":"罗马"}"#));
    Ok(())
}

#[test]
fn test_memoryStore_namespaces_shouldBeIsolated() {
    let first = MemoryStore::with_namespace("app_a_");
    let second = first.with_shared_map("app_b_");

    first.set("api_key", "a").unwrap();
    second.set("api_key", "b").unwrap();
    first.clear().unwrap();

    assert_eq!(first.get("api_key").unwrap(), None);
    assert_eq!(second.get("api_key").unwrap().as_deref(), Some("b"));
    assert_eq!(first.raw_len(), 1);
}

#[test]
fn test_settings_customInstruction_withBlankValue_shouldRemoveIt() {
    let settings = Settings::new(common::memory_store());

    settings.set_custom_instruction("Keep it formal.").unwrap();
    assert_eq!(settings.custom_instruction().as_deref(), Some("Keep it formal."));

    settings.set_custom_instruction("  ").unwrap();
    assert_eq!(settings.custom_instruction(), None);
}

#[test]
fn test_settings_clearAll_shouldAlsoDropGlossary() {
    let store = common::memory_store();
    let settings = Settings::new(store.clone());
    settings.set_api_key(" sk-test ").unwrap();
    GlossaryIndex::load(store.clone()).merge_new(&BTreeMap::from([("Nile".to_string(), "Nilo".to_string())]));

    assert_eq!(settings.api_key().as_deref(), Some("sk-test"));
    settings.clear_all().unwrap();

    assert_eq!(settings.api_key(), None);
    assert!(GlossaryIndex::load(store).is_empty());
}

#[test]
fn test_config_applySettings_shouldFillOnlyEmptyValues() {
    let settings = Settings::new(common::memory_store());
    settings.set_api_key("sk-persisted").unwrap();
    settings.set_custom_instruction("Be playful.").unwrap();

    let mut config = Config::default();
    config.apply_settings(&settings);
    assert_eq!(config.translation.get_api_key(), "sk-persisted");
    assert_eq!(config.translation.common.custom_instruction.as_deref(), Some("Be playful."));

    let mut configured = Config::default();
    configured.translation.set_api_key("sk-config");
    configured.apply_settings(&settings);
    assert_eq!(configured.translation.get_api_key(), "sk-config");
}
