// sections.rs — `fg sections`: the permanent allowlist.

use std::sync::Arc;

use clap::Subcommand;

use fg_policy::SectionsEditor;

use crate::Context;

#[derive(Subcommand)]
pub enum SectionsCommands {
    /// Print the stored allowlist (defaults when nothing is stored).
    Show,
    /// Replace the allowlist. Names are sanitized ("r/Rust" → "rust").
    Set {
        #[arg(required = true)]
        sections: Vec<String>,
    },
}

pub async fn execute(cmd: &SectionsCommands, ctx: &Context) -> anyhow::Result<()> {
    let policy = ctx.config.policy.normalized();
    let editor = SectionsEditor::new(Arc::clone(&ctx.storage), policy.default_sections);
    match cmd {
        SectionsCommands::Show => {
            for section in editor.load().await {
                println!("{}/{section}", policy.section_root);
            }
        }
        SectionsCommands::Set { sections } => {
            let stored = editor.save(sections)?;
            println!("Allowlist saved: {}", stored.join(", "));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fg_policy::{KeyValueStore, StorageArea, SECTIONS_KEY};

    #[tokio::test]
    async fn set_is_visible_to_the_policy_store() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::open(None, Some(dir.path())).unwrap();
        let cmd = SectionsCommands::Set {
            sections: vec!["r/Rust".to_string(), "homelab".to_string()],
        };
        execute(&cmd, &ctx).await.unwrap();

        let store = ctx.policy_store().await;
        assert!(store.decide("/r/rust/comments/1").is_allowed());
        assert!(store.decide("/r/homelab").is_allowed());
        assert!(!store.decide("/r/freelance").is_allowed());
        assert!(dir.path().join("sync.json").exists());
    }

    #[tokio::test]
    async fn empty_set_falls_back_to_sanitized_config_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("feedgate.toml");
        std::fs::write(&config, "[policy]\ndefault_sections = [\" R/Rust \", \"/r/rust\"]\n")
            .unwrap();
        let ctx = Context::open(Some(&config), Some(dir.path())).unwrap();
        let cmd = SectionsCommands::Set {
            sections: vec!["/".to_string(), "   ".to_string()],
        };
        execute(&cmd, &ctx).await.unwrap();

        let stored = ctx.storage.load(StorageArea::Sync, SECTIONS_KEY).await.unwrap();
        assert_eq!(stored, Some(serde_json::json!(["rust"])));
    }
}
