use crate::browser::FeedPage;
use crate::config::RunConfig;
use crate::error::{Result, ScraperError};
use crate::extract::ITEM_SELECTOR;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thirtyfour::prelude::*;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

const CHROMEDRIVER_PORT: u16 = 9515;
const CHROMEDRIVER_STARTUP: Duration = Duration::from_millis(1500);
const CONTAINER_WAIT: Duration = Duration::from_secs(6);
pub(super) const POLL_INTERVAL: Duration = Duration::from_millis(250);
const WINDOW_WIDTH: u32 = 1200;
const WINDOW_HEIGHT: u32 = 900;

/// A ChromeDriver-backed browser session.
///
/// Owned by the orchestrator for the whole run. `close` quits the browser and
/// stops a chromedriver process spawned by `start`; dropping an unclosed
/// session still kills that process.
pub struct SeleniumSession {
    driver: Option<WebDriver>,
    chromedriver: Option<Child>,
    pub(super) site_url: String,
    pub(super) wait: Duration,
}

impl SeleniumSession {
    /// Start Chrome. A configured chromedriver path that does not exist is a
    /// configuration error and nothing is launched.
    pub async fn start(config: &RunConfig) -> Result<Self> {
        let mut chromedriver = None;

        let server_url = match &config.chromedriver_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ScraperError::Config(format!(
                        "Chromedriver not found at: {}",
                        path.display()
                    )));
                }
                let child = Command::new(path)
                    .arg(format!("--port={}", CHROMEDRIVER_PORT))
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()?;
                chromedriver = Some(child);
                tokio::time::sleep(CHROMEDRIVER_STARTUP).await;
                format!("http://localhost:{}", CHROMEDRIVER_PORT)
            }
            None => config.webdriver_url.clone(),
        };

        let mut caps = DesiredCapabilities::chrome();
        let mut args = vec![
            "--disable-blink-features=AutomationControlled",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--start-maximized",
        ];
        if config.headless {
            args.insert(0, "--headless=new");
        }
        caps.add_chrome_option("args", args)?;

        if let Some(binary) = &config.chrome_binary {
            if !binary.exists() {
                return Err(ScraperError::Config(format!(
                    "Chrome binary not found at: {}",
                    binary.display()
                )));
            }
            caps.add_chrome_option("binary", binary.to_string_lossy().to_string())?;
        }

        let driver = WebDriver::new(&server_url, caps).await?;

        if let Err(e) = driver
            .set_window_rect(0, 0, WINDOW_WIDTH, WINDOW_HEIGHT)
            .await
        {
            warn!(error = %e, "Failed to set window size");
        }

        info!(server = %server_url, headless = config.headless, "Chrome driver started");

        Ok(Self {
            driver: Some(driver),
            chromedriver,
            site_url: config.site_url.trim_end_matches('/').to_string(),
            wait: Duration::from_secs(config.element_wait_secs),
        })
    }

    pub(super) fn driver(&self) -> Result<&WebDriver> {
        self.driver
            .as_ref()
            .ok_or_else(|| ScraperError::Driver("browser session already closed".to_string()))
    }

    /// Quit the browser and stop chromedriver. Failures are logged, never returned.
    pub(super) async fn shutdown(&mut self) {
        if let Some(driver) = self.driver.take() {
            match driver.quit().await {
                Ok(()) => info!("Driver closed"),
                Err(e) => warn!(error = %e, "Failed to quit browser"),
            }
        }

        if let Some(mut child) = self.chromedriver.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to stop chromedriver");
            }
        }
    }
}

impl Drop for SeleniumSession {
    fn drop(&mut self) {
        if self.driver.is_some() {
            warn!("Browser session dropped without close; chromedriver will be killed");
        }
    }
}

#[async_trait]
impl FeedPage for SeleniumSession {
    type Element = WebElement;

    async fn items(&self) -> Result<Vec<WebElement>> {
        Ok(self.driver()?.find_all(By::Css(ITEM_SELECTOR)).await?)
    }

    async fn outer_html(&self, element: &WebElement) -> Result<String> {
        Ok(element.outer_html().await?)
    }

    async fn permalink_hrefs(&self, element: &WebElement) -> Result<Vec<String>> {
        let links = element
            .find_all(By::XPath(".//a[contains(@href, \"/status/\")]"))
            .await?;

        let mut hrefs = Vec::with_capacity(links.len());
        for link in links {
            if let Some(href) = link.attr("href").await? {
                hrefs.push(href);
            }
        }
        Ok(hrefs)
    }

    async fn scroll_into_view(&self, element: &WebElement) -> Result<()> {
        element.scroll_into_view().await?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.driver()?
            .execute("window.scrollTo(0, document.body.scrollHeight);", Vec::new())
            .await?;
        Ok(())
    }

    async fn container_html(&self, selector: &str) -> Result<Option<String>> {
        let found = self
            .driver()?
            .query(By::Css(selector))
            .wait(CONTAINER_WAIT, POLL_INTERVAL)
            .first_opt()
            .await?;

        match found {
            Some(element) => Ok(Some(element.outer_html().await?)),
            None => {
                debug!(selector, "Container not present");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_missing_chromedriver_is_config_error() {
        let config = RunConfig {
            hashtags: vec!["#rust".to_string()],
            chromedriver_path: Some(PathBuf::from("/definitely/not/here/chromedriver")),
            ..Default::default()
        };
        let err = SeleniumSession::start(&config).await.err().unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Chromedriver not found"));
    }
}
