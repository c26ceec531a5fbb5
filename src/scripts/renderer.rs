use super::model::{PluginConfiguration, RenderItem};
use super::storage::ScriptStore;
use std::fmt::Write;

/// Body served when the host has not loaded the configuration yet.
pub const UNAVAILABLE_PLACEHOLDER: &str = "/* Plugin configuration not loaded. */\n";

/// Render the enabled scripts of one authentication group.
pub fn render<'a>(
    items: impl IntoIterator<Item = RenderItem<'a>>,
    requires_authentication: bool,
) -> String {
    let header = if requires_authentication {
        "/* JavaScript Injector: private scripts */"
    } else {
        "/* JavaScript Injector: public scripts */"
    };
    render_filtered(
        header,
        items
            .into_iter()
            .filter(|item| item.requires_authentication == requires_authentication),
    )
}

/// Render every enabled script regardless of group, for the legacy loader.
pub fn render_all<'a>(items: impl IntoIterator<Item = RenderItem<'a>>) -> String {
    render_filtered("/* Custom JavaScript from JavaScript Injector */", items)
}

fn render_filtered<'a>(header: &str, items: impl IntoIterator<Item = RenderItem<'a>>) -> String {
    let mut out = String::new();
    out.push_str(header);
    out.push('\n');

    for item in items {
        if !item.enabled || item.script.trim().is_empty() {
            continue;
        }
        write_wrapped(&mut out, &item);
    }
    out
}

fn write_wrapped(out: &mut String, item: &RenderItem<'_>) {
    let label = comment_safe(item.name);
    // Writing into a String cannot fail.
    let _ = match item.owner {
        Some((plugin, version)) if !version.trim().is_empty() => writeln!(
            out,
            "/* Script: {} (from {} v{}) */",
            label,
            comment_safe(plugin),
            comment_safe(version)
        ),
        Some((plugin, _)) => writeln!(
            out,
            "/* Script: {} (from {}) */",
            label,
            comment_safe(plugin)
        ),
        None => writeln!(out, "/* Script: {} */", label),
    };
    out.push_str("(function() { try {\n");
    out.push_str(item.script);
    if !item.script.ends_with('\n') {
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "}} catch (e) {{ console.error('Error in Injected JavaScript [\"{}\"]:', e); }} }})();",
        js_string_safe(item.name)
    );
}

fn comment_safe(text: &str) -> String {
    text.replace("*/", "* /").replace(['\r', '\n'], " ")
}

fn js_string_safe(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '<' => out.push_str("\\x3C"),
            _ => out.push(c),
        }
    }
    out
}

/// Render straight from the store, falling back to the placeholder when the
/// configuration is unavailable.
pub fn render_store(store: &ScriptStore, requires_authentication: bool) -> String {
    store
        .read(|config: &PluginConfiguration| render(config.render_items(), requires_authentication))
        .unwrap_or_else(|| {
            log::error!("[Render] Plugin configuration is not available");
            UNAVAILABLE_PLACEHOLDER.to_string()
        })
}

/// Legacy counterpart of [`render_store`].
pub fn render_store_all(store: &ScriptStore) -> String {
    store
        .read(|config: &PluginConfiguration| render_all(config.render_items()))
        .unwrap_or_else(|| {
            log::error!("[Render] Plugin configuration is not available");
            UNAVAILABLE_PLACEHOLDER.to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripts::model::{RegisteredScriptEntry, ScriptEntry};
    use crate::scripts::storage::tests::MemoryPersistence;
    use std::sync::Arc;

    fn entry(name: &str, script: &str, enabled: bool, private: bool) -> ScriptEntry {
        ScriptEntry {
            name: name.to_string(),
            script: script.to_string(),
            enabled,
            requires_authentication: private,
        }
    }

    fn sample_config() -> PluginConfiguration {
        PluginConfiguration {
            custom_java_scripts: vec![
                entry("A", "console.log('A');", true, false),
                entry("B", "console.log('B');", false, false),
                entry("C", "console.log('C');", true, true),
            ],
            plugin_java_scripts: vec![],
        }
    }

    #[test]
    fn test_public_render_filters() {
        let config = sample_config();
        let out = render(config.render_items(), false);
        assert!(out.contains("console.log('A');"));
        assert!(!out.contains("console.log('B');"));
        assert!(!out.contains("console.log('C');"));
    }

    #[test]
    fn test_private_render_filters() {
        let config = sample_config();
        let out = render(config.render_items(), true);
        assert!(!out.contains("console.log('A');"));
        assert!(!out.contains("console.log('B');"));
        assert!(out.contains("console.log('C');"));
    }

    #[test]
    fn test_wrapper_shape() {
        let config = PluginConfiguration {
            custom_java_scripts: vec![entry("Hello", "alert(1);", true, false)],
            plugin_java_scripts: vec![],
        };
        let out = render(config.render_items(), false);
        let expected = "/* JavaScript Injector: public scripts */\n\
            /* Script: Hello */\n\
            (function() { try {\n\
            alert(1);\n\
            } catch (e) { console.error('Error in Injected JavaScript [\"Hello\"]:', e); } })();\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_blank_bodies_skipped() {
        let config = PluginConfiguration {
            custom_java_scripts: vec![entry("Empty", "  \n\t", true, false)],
            plugin_java_scripts: vec![],
        };
        let out = render(config.render_items(), false);
        assert!(!out.contains("Empty"));
        assert!(!out.contains("function"));
    }

    #[test]
    fn test_registered_entries_follow_custom_ones() {
        let config = PluginConfiguration {
            custom_java_scripts: vec![entry("User", "user();", true, false)],
            plugin_java_scripts: vec![RegisteredScriptEntry {
                id: "x".to_string(),
                name: "Plugin Script".to_string(),
                script: "plugin();".to_string(),
                enabled: true,
                requires_authentication: false,
                plugin_id: "p".to_string(),
                plugin_name: "Other Plugin".to_string(),
                plugin_version: "1.2.0".to_string(),
            }],
        };
        let out = render(config.render_items(), false);
        let user_at = out.find("user();").unwrap();
        let plugin_at = out.find("plugin();").unwrap();
        assert!(user_at < plugin_at);
        assert!(out.contains("/* Script: Plugin Script (from Other Plugin v1.2.0) */"));
    }

    #[test]
    fn test_hostile_name_is_escaped() {
        let config = PluginConfiguration {
            custom_java_scripts: vec![entry("x */ evil('\"", "ok();", true, false)],
            plugin_java_scripts: vec![],
        };
        let out = render(config.render_items(), false);
        assert!(out.contains("/* Script: x * / evil('\" */"));
        assert!(out.contains("[\"x */ evil(\\'\\\"\"]"));
    }

    #[test]
    fn test_render_all_ignores_group() {
        let config = sample_config();
        let out = render_all(config.render_items());
        assert!(out.contains("console.log('A');"));
        assert!(out.contains("console.log('C');"));
        assert!(!out.contains("console.log('B');"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let config = sample_config();
        assert_eq!(
            render(config.render_items(), false),
            render(config.render_items(), false)
        );
    }

    #[test]
    fn test_unavailable_store_renders_placeholder() {
        let store = ScriptStore::new(Arc::new(MemoryPersistence::default()));
        assert_eq!(render_store(&store, false), UNAVAILABLE_PLACEHOLDER);
        assert_eq!(render_store_all(&store), UNAVAILABLE_PLACEHOLDER);
    }
}
