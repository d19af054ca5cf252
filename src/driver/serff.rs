// src/driver/serff.rs
//! HTTP-backed page driver for SERFF filing-access pages.
//!
//! Sessions are cookie-scoped: the consent flow walks the per-state
//! entry page ("Begin Search" → user agreement → accept), after which
//! the cookie jar carries the accepted-agreement state the site expects.
//! Page parsing uses CSS selectors; all parsing happens in synchronous
//! helpers on owned response bodies so no parser state crosses an await
//! point.

use super::{AttachmentRef, DriverFactory, DriverOptions, PageContent, PageDriver, PageItem};
use crate::constants::SESSION_FLOW_WAIT;
use crate::error::DriverError;
use crate::model::GroupKey;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Builds one [`SerffDriver`] per worker.
pub struct SerffDriverFactory {
    options: DriverOptions,
    auth_url_base: String,
}

impl SerffDriverFactory {
    pub fn new(options: DriverOptions) -> Self {
        Self {
            options,
            auth_url_base: crate::constants::AUTH_URL_BASE.to_string(),
        }
    }

    /// Points the consent flow at a different host. Used by tests that
    /// stand in for the upstream site.
    #[allow(dead_code)]
    pub fn with_auth_url_base(mut self, base: impl Into<String>) -> Self {
        self.auth_url_base = base.into();
        self
    }
}

impl DriverFactory for SerffDriverFactory {
    fn create(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        if self.options.browser_binary.is_some() || self.options.driver_path.is_some() {
            log::debug!(
                "BROWSER_BINARY/DRIVER_PATH overrides are set; the HTTP driver does not launch a browser and leaves them to native-automation backends"
            );
        }
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DriverError::Startup {
                cause: e.to_string(),
            })?;

        Ok(Box::new(SerffDriver {
            client,
            auth_url_base: self.auth_url_base.clone(),
        }))
    }
}

/// One worker's HTTP session against the filing-access site.
pub struct SerffDriver {
    client: reqwest::Client,
    auth_url_base: String,
}

#[async_trait]
impl PageDriver for SerffDriver {
    async fn establish_session(&self, group_key: &GroupKey) -> Result<(), DriverError> {
        let flow_err = |cause: &str| DriverError::SessionFlow {
            group_key: group_key.as_str().to_string(),
            cause: cause.to_string(),
        };

        let home_url = format!("{}{}", self.auth_url_base, group_key.as_str());
        let home_body = self
            .fetch_text(&home_url, SESSION_FLOW_WAIT)
            .await
            .map_err(|e| flow_err(&e.to_string()))?;

        let begin_href = parse_begin_search_href(&home_body)
            .ok_or_else(|| flow_err("'Begin Search' control not found"))?;
        let agreement_url = resolve_href(&home_url, &begin_href)
            .map_err(|e| flow_err(&format!("bad agreement href: {}", e)))?;

        let agreement_body = self
            .fetch_text(&agreement_url, SESSION_FLOW_WAIT)
            .await
            .map_err(|e| flow_err(&e.to_string()))?;

        let consent = parse_consent_form(&agreement_body)
            .ok_or_else(|| flow_err("accept control not found on agreement page"))?;
        let action_url = resolve_href(&agreement_url, &consent.action)
            .map_err(|e| flow_err(&format!("bad consent action: {}", e)))?;

        self.client
            .post(&action_url)
            .form(&consent.params)
            .send()
            .await
            .map_err(|e| flow_err(&e.to_string()))?
            .error_for_status()
            .map_err(|e| flow_err(&e.to_string()))?;

        log::debug!("Consent flow accepted for '{}'", group_key);
        Ok(())
    }

    async fn load_page(&self, url: &str, wait: Duration) -> Result<PageContent, DriverError> {
        let deadline = tokio::time::Instant::now() + wait;
        let poll = crate::constants::DEFAULT_POLL_INTERVAL;

        // Re-fetch until the content markers appear or the wait elapses.
        // The site renders filing rows server-side, but a page fetched
        // mid-deployment or under load can come back without them.
        loop {
            match self.fetch_text(url, wait).await {
                Ok(body) => {
                    if let Some(mut content) = parse_filing_page(&body) {
                        resolve_attachment_urls(url, &mut content);
                        return Ok(content);
                    }
                }
                Err(e) => log::debug!("Fetch attempt for {} failed: {}", url, e),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::ContentTimeout {
                    url: url.to_string(),
                });
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn trigger_attachment(
        &self,
        attachment: &AttachmentRef,
        download_dir: &Path,
    ) -> Result<(), DriverError> {
        std::fs::create_dir_all(download_dir).map_err(|e| DriverError::Download {
            url: attachment.url.clone(),
            cause: e.to_string(),
        })?;

        // Fire and forget: the caller detects arrival by polling the
        // directory, exactly as it would under a real browser download.
        let client = self.client.clone();
        let url = attachment.url.clone();
        let dir = download_dir.to_path_buf();
        tokio::spawn(async move {
            if let Err(e) = download_into(&client, &url, &dir).await {
                log::debug!("Attachment download from {} failed: {}", url, e);
            }
        });

        Ok(())
    }
}

impl SerffDriver {
    async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String, DriverError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Streams one attachment into the download directory.
///
/// The in-progress sibling marker (`<name>.part`) exists for the whole
/// write, so the detection poll never picks up a half-written file.
async fn download_into(
    client: &reqwest::Client,
    url: &str,
    dir: &Path,
) -> Result<PathBuf, DriverError> {
    use futures::StreamExt;

    let wrap = |cause: String| DriverError::Download {
        url: url.to_string(),
        cause,
    };

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(DriverError::Network)?;

    let target = dir.join(download_file_name(url, dir));
    let marker = in_progress_marker(&target);

    std::fs::write(&marker, b"").map_err(|e| wrap(e.to_string()))?;

    let result = async {
        let mut file = tokio::fs::File::create(&target)
            .await
            .map_err(|e| wrap(e.to_string()))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(DriverError::Network)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| wrap(e.to_string()))?;
        }
        file.flush().await.map_err(|e| wrap(e.to_string()))?;
        Ok::<(), DriverError>(())
    }
    .await;

    // Marker removal is what publishes the file to the detection poll.
    let _ = std::fs::remove_file(&marker);

    match result {
        Ok(()) => {
            log::debug!("Downloaded {} to {}", url, target.display());
            Ok(target)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&target);
            Err(e)
        }
    }
}

/// Sibling marker path for an in-flight download.
pub fn in_progress_marker(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(crate::constants::IN_PROGRESS_SUFFIX);
    PathBuf::from(name)
}

/// Picks a `.pdf` file name from the URL's last path segment, made
/// unique against names already present in the directory.
fn download_file_name(url: &str, dir: &Path) -> String {
    let base = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
                .map(str::to_string)
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "attachment".to_string());

    let stem = base
        .strip_suffix(crate::constants::ARTIFACT_SUFFIX)
        .unwrap_or(&base);

    let mut candidate = format!("{}{}", stem, crate::constants::ARTIFACT_SUFFIX);
    let mut counter = 1;
    while dir.join(&candidate).exists() {
        candidate = format!("{} ({}){}", stem, counter, crate::constants::ARTIFACT_SUFFIX);
        counter += 1;
    }
    candidate
}

fn resolve_href(base: &str, href: &str) -> Result<String, url::ParseError> {
    Ok(url::Url::parse(base)?.join(href)?.to_string())
}

/// Attachment hrefs come off the page relative; the download client
/// needs them absolute against the page URL.
fn resolve_attachment_urls(page_url: &str, content: &mut PageContent) {
    for item in &mut content.items {
        if let Some(attachment) = &mut item.attachment {
            match resolve_href(page_url, &attachment.url) {
                Ok(resolved) => attachment.url = resolved,
                Err(e) => log::debug!(
                    "Unresolvable attachment href '{}': {}",
                    attachment.url,
                    e
                ),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Synchronous HTML parsing
// ---------------------------------------------------------------------------

struct ConsentForm {
    action: String,
    params: Vec<(String, String)>,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

/// Finds the href of the "Begin Search" link on the per-state home page.
fn parse_begin_search_href(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let links = selector("a[href*='userAgreement.xhtml']");
    document
        .select(&links)
        .find(|a| a.text().collect::<String>().trim() == "Begin Search")
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// Finds the consent form on the user-agreement page and collects its
/// submittable parameters, including the accept control itself.
fn parse_consent_form(body: &str) -> Option<ConsentForm> {
    let document = Html::parse_document(body);
    let forms = selector("form");
    let inputs = selector("input[name]");
    let accept_spans = selector("span");

    for form in document.select(&forms) {
        let has_accept = form
            .select(&accept_spans)
            .any(|s| s.text().collect::<String>().trim() == "Accept");
        if !has_accept {
            continue;
        }

        let action = form.value().attr("action").unwrap_or("").to_string();
        let mut params: Vec<(String, String)> = form
            .select(&inputs)
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                let value = input.value().attr("value").unwrap_or("");
                Some((name.to_string(), value.to_string()))
            })
            .collect();
        if let Some(form_id) = form.value().attr("id") {
            params.push((format!("{}:accept", form_id), "Accept".to_string()));
        }
        return Some(ConsentForm { action, params });
    }
    None
}

/// Parses a filing page into structured content.
///
/// Returns `None` when the expected content markers (`div.row`) are not
/// present, which the caller treats as "not rendered yet".
fn parse_filing_page(body: &str) -> Option<PageContent> {
    let document = Html::parse_document(body);
    let rows = selector("div.row");
    let names = selector("div.col-lg-4.summaryScheduleItemData");
    let download_links = selector("a[id*='downloadAttachment_']");
    let labels = selector("label");

    let row_elements: Vec<ElementRef> = document.select(&rows).collect();
    if row_elements.is_empty() {
        return None;
    }

    let submission_date = document
        .select(&labels)
        .find(|label| {
            label
                .text()
                .collect::<String>()
                .contains("Submission Date")
        })
        .and_then(sibling_value_div)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    let mut items = Vec::new();
    for row in &row_elements {
        let Some(name_el) = row.select(&names).next() else {
            continue;
        };
        let form_name = name_el.text().collect::<String>().trim().to_string();
        if form_name.is_empty() {
            continue;
        }

        let attachment = row
            .select(&download_links)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| AttachmentRef {
                url: href.to_string(),
            });

        items.push(PageItem {
            form_name,
            attachment,
        });
    }

    Some(PageContent {
        submission_date,
        items,
    })
}

/// The value `div` that shares a parent with a field label.
fn sibling_value_div(label: ElementRef) -> Option<String> {
    let parent = ElementRef::wrap(label.parent()?)?;
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")
        .map(|el| el.text().collect::<String>())
}
