#[cfg(test)]
mod tests {
    use miniclaw_core::Role;
    use miniclaw_memory::*;

    // ── Session ────────────────────────────────────────────────

    mod session {
        use super::*;

        #[test]
        fn test_recent_messages_drops_leading_assistant() {
            let mut s = Session::new("k");
            s.add(Role::User, "one", vec![]);
            s.add(Role::Assistant, "two", vec![]);
            s.add(Role::User, "three", vec![]);
            s.add(Role::Assistant, "four", vec![]);

            let recent = s.recent_messages(3);
            assert_eq!(recent.len(), 2);
            assert_eq!(recent[0].role, Role::User);
            assert_eq!(recent[0].text_content(), "three");

            assert_eq!(s.recent_messages(10).len(), 4);
            assert!(s.recent_messages(0).is_empty());
        }

        #[test]
        fn test_recent_messages_skips_blank_turns() {
            let mut s = Session::new("k");
            s.add(Role::User, "hi", vec![]);
            s.add(Role::Assistant, "", vec![]);
            s.add(Role::User, "again", vec![]);
            s.add(Role::Assistant, "  \n", vec![]);

            let turns: Vec<String> = s.recent_messages(10).iter().map(|m| m.text_content()).collect();
            assert_eq!(turns, vec!["hi", "again"]);
        }

        #[test]
        fn test_watermark_only_moves_forward() {
            let mut s = Session::new("k");
            for i in 0..6 {
                s.add(Role::User, format!("m{i}"), vec![]);
            }
            s.advance_watermark(4);
            assert_eq!(s.last_consolidated, 4);
            s.advance_watermark(2);
            assert_eq!(s.last_consolidated, 4);
            s.advance_watermark(99);
            assert_eq!(s.last_consolidated, 6);
            assert_eq!(s.unconsolidated(), 0);
        }

        #[test]
        fn test_clear_resets_watermark() {
            let mut s = Session::new("k");
            s.add(Role::User, "x", vec![]);
            s.advance_watermark(1);
            s.clear();
            assert!(s.messages.is_empty());
            assert_eq!(s.last_consolidated, 0);
        }

        #[test]
        fn test_serialized_field_names() {
            let mut s = Session::new("telegram_1");
            s.add(Role::Assistant, "hi", vec!["exec".into()]);
            s.add(Role::User, "yo", vec![]);
            let json = serde_json::to_value(&s).unwrap();
            assert_eq!(json["key"], "telegram_1");
            assert_eq!(json["lastConsolidated"], 0);
            assert_eq!(json["messages"][0]["role"], "assistant");
            assert_eq!(json["messages"][0]["toolsUsed"][0], "exec");
            assert!(json["messages"][1].get("toolsUsed").is_none());
            assert!(json["messages"][1]["timestamp"].is_string());
        }
    }

    // ── Session store ──────────────────────────────────────────

    mod store {
        use super::*;

        #[test]
        fn test_path_replaces_unsafe_characters() {
            let store = SessionStore::new("/data/sessions");
            assert_eq!(
                store.path_for("cli:direct"),
                std::path::PathBuf::from("/data/sessions/cli_direct.json")
            );
            assert_eq!(
                store.path_for("a/b\\c"),
                std::path::PathBuf::from("/data/sessions/a_b_c.json")
            );
        }

        #[tokio::test]
        async fn test_save_then_load_roundtrip() {
            let dir = tempfile::tempdir().unwrap();
            let store = SessionStore::new(dir.path().join("sessions"));
            let mut s = Session::new("heartbeat:main");
            s.add(Role::User, "ping", vec![]);
            s.add(Role::Assistant, "pong", vec!["read_file".into()]);
            s.advance_watermark(1);
            store.save(&s).await.unwrap();

            let loaded = store.load("heartbeat:main").await;
            assert_eq!(loaded, s);
            assert!(dir.path().join("sessions/heartbeat_main.json").exists());
        }

        #[tokio::test]
        async fn test_missing_session_is_empty() {
            let dir = tempfile::tempdir().unwrap();
            let store = SessionStore::new(dir.path());
            let s = store.load("nobody").await;
            assert_eq!(s.key, "nobody");
            assert!(s.messages.is_empty());
        }

        #[tokio::test]
        async fn test_corrupt_file_loads_fresh() {
            let dir = tempfile::tempdir().unwrap();
            let store = SessionStore::new(dir.path());
            std::fs::write(store.path_for("bad"), "{not json").unwrap();
            let s = store.load("bad").await;
            assert!(s.messages.is_empty());
        }

        #[tokio::test]
        async fn test_out_of_range_watermark_is_clamped() {
            let dir = tempfile::tempdir().unwrap();
            let store = SessionStore::new(dir.path());
            std::fs::write(
                store.path_for("k"),
                r#"{"key":"k","messages":[],"lastConsolidated":7}"#,
            )
            .unwrap();
            assert_eq!(store.load("k").await.last_consolidated, 0);
        }

        #[tokio::test]
        async fn test_update_persists_changes() {
            let dir = tempfile::tempdir().unwrap();
            let store = SessionStore::new(dir.path());
            let len = store
                .update("k", |s| {
                    s.add(Role::User, "hello", vec![]);
                    s.messages.len()
                })
                .await
                .unwrap();
            assert_eq!(len, 1);
            assert_eq!(store.load("k").await.messages[0].content, "hello");
        }

        #[tokio::test]
        async fn test_concurrent_updates_do_not_lose_writes() {
            let dir = tempfile::tempdir().unwrap();
            let store = std::sync::Arc::new(SessionStore::new(dir.path()));
            let mut handles = vec![];
            for i in 0..10 {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    store
                        .update("shared", |s| s.add(Role::User, format!("m{i}"), vec![]))
                        .await
                        .unwrap();
                }));
            }
            for h in handles {
                h.await.unwrap();
            }
            assert_eq!(store.load("shared").await.messages.len(), 10);
        }

        #[cfg(unix)]
        #[tokio::test]
        async fn test_session_file_is_owner_only() {
            use std::os::unix::fs::PermissionsExt;
            let dir = tempfile::tempdir().unwrap();
            let store = SessionStore::new(dir.path().join("s"));
            store.save(&Session::new("k")).await.unwrap();
            let mode = std::fs::metadata(store.path_for("k"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    // ── Workspace memory ───────────────────────────────────────

    mod workspace {
        use super::*;

        #[test]
        fn test_missing_documents_read_empty() {
            let dir = tempfile::tempdir().unwrap();
            let mem = MemoryStore::new(dir.path().join("ws"));
            assert_eq!(mem.read_memory(), "");
            assert_eq!(mem.read_history(), "");
            assert_eq!(mem.read_doc("SOUL.md"), None);
        }

        #[test]
        fn test_history_appends_lines() {
            let dir = tempfile::tempdir().unwrap();
            let mem = MemoryStore::new(dir.path());
            mem.append_history("[2026-01-01 10:00] first").unwrap();
            mem.append_history("[2026-01-02 10:00] second").unwrap();
            assert_eq!(
                mem.read_history(),
                "[2026-01-01 10:00] first\n[2026-01-02 10:00] second\n"
            );
        }

        #[test]
        fn test_memory_overwrites() {
            let dir = tempfile::tempdir().unwrap();
            let mem = MemoryStore::new(dir.path().join("nested"));
            mem.write_memory("likes tea").unwrap();
            mem.write_memory("likes coffee").unwrap();
            assert_eq!(mem.read_memory(), "likes coffee");
        }

        #[test]
        fn test_read_doc_trims_and_skips_blank() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("USER.md"), "\n  Name: Sam \n\n").unwrap();
            std::fs::write(dir.path().join("AGENTS.md"), "   \n").unwrap();
            let mem = MemoryStore::new(dir.path());
            assert_eq!(mem.read_doc("USER.md").as_deref(), Some("Name: Sam"));
            assert_eq!(mem.read_doc("AGENTS.md"), None);
        }
    }
}
