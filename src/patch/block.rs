use crate::common::models::ROUTE_PREFIX;

pub const START_MARKER: &str = "<!-- BEGIN JavaScript Injector Plugin -->";
pub const END_MARKER: &str = "<!-- END JavaScript Injector Plugin -->";
pub const TRANSFORMATION_MARKER: &str = "<!-- Injected using file-transformation -->";

/// Interval at which the loader checks for an authenticated session.
pub const AUTH_POLL_INTERVAL_MS: u32 = 300;

/// Which writer owns the block: direct file patching or a transformation host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFlavor {
    Direct,
    Transformation,
}

/// Builder for the delimited loader block placed before `</body>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionBlock {
    base_path: String,
}

impl Default for InjectionBlock {
    fn default() -> Self {
        Self::new("..")
    }
}

impl InjectionBlock {
    /// `base_path` is prepended to the public script route, e.g. `..` or `/jellyfin`.
    pub fn new(base_path: impl Into<String>) -> Self {
        let base_path = base_path.into().trim_end_matches('/').to_string();
        Self { base_path }
    }

    pub fn public_script_url(&self) -> String {
        format!("{}/{}/public.js", self.base_path, ROUTE_PREFIX)
    }

    pub fn render(&self, flavor: BlockFlavor) -> String {
        let mut block = String::new();
        block.push_str(START_MARKER);
        block.push('\n');
        if flavor == BlockFlavor::Transformation {
            block.push_str(TRANSFORMATION_MARKER);
            block.push('\n');
        }
        block.push_str(&format!(
            "<script defer src=\"{}\"></script>\n",
            self.public_script_url()
        ));
        block.push_str(&private_loader());
        block.push('\n');
        block.push_str(END_MARKER);
        block
    }
}

// Polling stops before the fetch is issued, so a failed fetch never restarts it.
fn private_loader() -> String {
    format!(
        r#"<script>
(function () {{
    'use strict';
    var authInterval = null;
    function loadPrivateScripts() {{
        var client = window.ApiClient;
        if (!client || typeof client.getCurrentUserId !== 'function' || !client.getCurrentUserId() || !client.serverInfo) {{
            return;
        }}
        clearInterval(authInterval);
        client.fetch({{
            url: client.getUrl('{prefix}/private.js'),
            type: 'GET',
            dataType: 'text'
        }}).then(function (scriptText) {{
            if (scriptText && scriptText.trim().length > 0) {{
                var element = document.createElement('script');
                element.textContent = scriptText;
                document.head.appendChild(element);
                console.log('JavaScript Injector: private scripts loaded.');
            }}
        }}).catch(function (err) {{
            console.error('JavaScript Injector: failed to load private scripts.', err);
        }});
    }}
    authInterval = setInterval(loadPrivateScripts, {interval});
}})();
</script>"#,
        prefix = ROUTE_PREFIX,
        interval = AUTH_POLL_INTERVAL_MS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_is_delimited() {
        let block = InjectionBlock::default().render(BlockFlavor::Direct);
        assert!(block.starts_with(START_MARKER));
        assert!(block.ends_with(END_MARKER));
        assert_eq!(block.matches(START_MARKER).count(), 1);
        assert!(!block.contains(TRANSFORMATION_MARKER));
    }

    #[test]
    fn test_block_references_both_endpoints() {
        let block = InjectionBlock::default().render(BlockFlavor::Direct);
        assert!(block.contains("src=\"../JavaScriptInjector/public.js\""));
        assert!(block.contains("'JavaScriptInjector/private.js'"));
        assert!(block.contains("setInterval(loadPrivateScripts, 300)"));
        assert!(block.contains("clearInterval(authInterval);"));
    }

    #[test]
    fn test_transformation_flavor_carries_marker() {
        let block = InjectionBlock::default().render(BlockFlavor::Transformation);
        assert!(block.contains(TRANSFORMATION_MARKER));
    }

    #[test]
    fn test_base_path_trailing_slash_trimmed() {
        let block = InjectionBlock::new("/media/");
        assert_eq!(block.public_script_url(), "/media/JavaScriptInjector/public.js");
    }

    #[test]
    fn test_render_is_deterministic() {
        let block = InjectionBlock::default();
        assert_eq!(block.render(BlockFlavor::Direct), block.render(BlockFlavor::Direct));
    }
}
