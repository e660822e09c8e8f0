//! Fetching raw image bytes for the texture pipeline.

use futures::future::LocalBoxFuture;

/// Where texture bytes come from.
///
/// The returned future must not borrow `self`: the pipeline drives it on its own
/// task, detached from the request that started it.
pub trait ImageSource {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, anyhow::Result<Vec<u8>>>;
}

/// Loads files from the page's asset directory.
///
/// In the browser, relative names resolve against `<origin>/<root>/` and absolute URLs
/// are fetched unchanged. Native builds read `./<root>/<name>` from disk.
#[derive(Debug, Clone)]
pub struct AssetSource {
    root: String,
}

impl AssetSource {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageSource for AssetSource {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, anyhow::Result<Vec<u8>>> {
        let root = self.root.clone();
        let url = url.to_string();
        Box::pin(async move { load_binary(&root, &url).await })
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> anyhow::Result<reqwest::Url> {
    if let Ok(absolute) = reqwest::Url::parse(file_name) {
        return Ok(absolute);
    }
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no global window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("page origin is unavailable: {:?}", e))?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, root.trim_matches('/')))?;
    Ok(base.join(file_name)?)
}

pub async fn load_binary(root: &str, file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(root, file_name)?;
        reqwest::get(url)
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new("./").join(root).join(file_name);
        std::fs::read(&path).map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?
    };

    Ok(data)
}
