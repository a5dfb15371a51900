//! Login, explore, search and tab selection for [`SeleniumSession`].
//!
//! Each step tries a list of selector candidates and degrades instead of
//! failing when the markup has moved on.

use super::selenium::{SeleniumSession, POLL_INTERVAL};
use super::FeedSession;
use crate::error::{Result, ScraperError};
use crate::types::Credentials;
use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::prelude::*;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const USERNAME_INPUTS: &[&str] = &[
    r#"input[name="text"]"#,
    r#"input[autocomplete="username"]"#,
    r#"input[placeholder="Phone, email, or username"]"#,
    r#"input[aria-label="Phone, email, or username"]"#,
];

const PASSWORD_INPUTS: &[&str] = &[
    r#"input[name="password"]"#,
    r#"input[autocomplete="current-password"]"#,
    r#"input[type="password"]"#,
];

const SEARCH_INPUT: &str = r#"[data-testid="SearchBox_Search_Input"], [data-testid="searchBox"] input, input[aria-label="Search query"], input[placeholder="Search"]"#;

const NEXT_BUTTON_XPATH: &str = "//span[normalize-space()='Next']/ancestor::button";
const LOGIN_BUTTON_CSS: &str = r#"[data-testid="LoginForm_Login_Button"]"#;
const LOGIN_BUTTON_XPATH: &str = "//span[normalize-space()='Log in']/ancestor::button";
const EXPLORE_ICON_XPATH: &str =
    "//*[self::button or self::div or self::a][.//svg//path[contains(@d,'M10.25 3.75')]]";
const EXPLORE_TEXT_XPATH: &str =
    "//button[.//span[normalize-space()='Explore']] | //a[.//span[normalize-space()='Explore']]";
const LATEST_TAB_XPATH: &str =
    "//a[contains(@href,'f=live') and (contains(., 'Latest') or .//span[text()='Latest'])]";
const LATEST_TEXT_XPATH: &str = "//a[.//span[normalize-space()='Latest'] or normalize-space()='Latest']";

const SHORT_WAIT: Duration = Duration::from_secs(6);
const VERIFY_WAIT: Duration = Duration::from_secs(4);

async fn first_present(driver: &WebDriver, selectors: &[&str], wait: Duration) -> Option<WebElement> {
    for selector in selectors {
        match driver
            .query(By::Css(*selector))
            .wait(wait, POLL_INTERVAL)
            .first_opt()
            .await
        {
            Ok(Some(element)) => return Some(element),
            Ok(None) => debug!(selector, "Input candidate not present"),
            Err(e) => debug!(selector, error = %e, "Input candidate lookup failed"),
        }
    }
    None
}

async fn click_centered(driver: &WebDriver, element: &WebElement) -> Result<()> {
    driver
        .execute(
            "arguments[0].scrollIntoView({block:'center'});",
            vec![element.to_json()?],
        )
        .await?;
    sleep(Duration::from_millis(200)).await;
    element.click().await?;
    Ok(())
}

async fn type_into(element: &WebElement, text: &str) -> Result<()> {
    element.click().await?;
    element.clear().await?;
    element.send_keys(text).await?;
    Ok(())
}

impl SeleniumSession {
    async fn explore_reachable(&self) -> bool {
        let Ok(driver) = self.driver() else {
            return false;
        };
        if let Ok(url) = driver.current_url().await {
            if url.as_str().contains("/explore") {
                return true;
            }
        }
        matches!(
            driver
                .query(By::Css(SEARCH_INPUT))
                .wait(VERIFY_WAIT, POLL_INTERVAL)
                .first_opt()
                .await,
            Ok(Some(_))
        )
    }

    async fn click_and_verify(&self, xpath: &str) -> Result<bool> {
        let driver = self.driver()?;
        let element = driver.find(By::XPath(xpath)).await?;
        click_centered(driver, &element).await?;
        sleep(Duration::from_secs(1)).await;
        Ok(self.explore_reachable().await)
    }
}

#[async_trait]
impl FeedSession for SeleniumSession {
    async fn login(&self, credentials: &Credentials) -> Result<()> {
        info!(user = %credentials.username, "Attempting login");
        let driver = self.driver()?;
        driver.goto(format!("{}/i/flow/login", self.site_url)).await?;

        let username_input = first_present(driver, USERNAME_INPUTS, self.wait).await;
        match &username_input {
            Some(input) => {
                info!("Found username input - typing");
                type_into(input, &credentials.username).await?;
                sleep(Duration::from_millis(350)).await;
            }
            None => warn!("Username input not found"),
        }

        match driver.find(By::XPath(NEXT_BUTTON_XPATH)).await {
            Ok(next) => {
                info!("Clicking Next");
                if let Err(e) = click_centered(driver, &next).await {
                    warn!(error = %e, "Next click failed");
                }
            }
            Err(_) => {
                if let Some(input) = &username_input {
                    input.send_keys(Key::Enter.to_string()).await?;
                    info!("Pressed Enter on username input");
                }
            }
        }

        let password_input = first_present(driver, PASSWORD_INPUTS, SHORT_WAIT).await;
        match &password_input {
            Some(input) => {
                info!("Found password input - typing");
                type_into(input, &credentials.password).await?;
                sleep(Duration::from_millis(300)).await;
            }
            None => warn!("Password input not found"),
        }

        let login_button = match driver.find(By::Css(LOGIN_BUTTON_CSS)).await {
            Ok(button) => Some(button),
            Err(_) => driver.find(By::XPath(LOGIN_BUTTON_XPATH)).await.ok(),
        };

        match login_button {
            Some(button) => {
                info!("Clicking Log in");
                if button.attr("disabled").await?.is_some() {
                    sleep(Duration::from_millis(1200)).await;
                }
                if let Err(e) = click_centered(driver, &button).await {
                    warn!(error = %e, "Log in click failed");
                }
            }
            None => {
                if let Some(input) = &password_input {
                    input.send_keys(Key::Enter.to_string()).await?;
                    info!("Pressed Enter on password input");
                }
            }
        }

        sleep(Duration::from_secs(1)).await;
        info!("Login attempted");
        Ok(())
    }

    async fn open_explore(&self) -> Result<bool> {
        info!("Opening explore");

        for (label, xpath) in [("search icon", EXPLORE_ICON_XPATH), ("Explore text", EXPLORE_TEXT_XPATH)] {
            match self.click_and_verify(xpath).await {
                Ok(true) => {
                    info!(via = label, "Explore reached");
                    return Ok(true);
                }
                Ok(false) => debug!(via = label, "Clicked but explore not visible"),
                Err(e) => debug!(via = label, error = %e, "Explore click failed"),
            }
        }

        let driver = self.driver()?;
        match driver.goto(format!("{}/explore", self.site_url)).await {
            Ok(()) => {
                sleep(Duration::from_secs(1)).await;
                if self.explore_reachable().await {
                    info!("Navigated to /explore fallback");
                    return Ok(true);
                }
            }
            Err(e) => warn!(error = %e, "Navigate to /explore failed"),
        }

        warn!("Explore not reachable");
        Ok(false)
    }

    async fn search(&self, query: &str) -> Result<()> {
        info!(query, "Searching");
        let driver = self.driver()?;

        let found = driver
            .query(By::Css(SEARCH_INPUT))
            .wait(self.wait, POLL_INTERVAL)
            .first_opt()
            .await?;
        let element = found.ok_or_else(|| ScraperError::ElementNotFound("search input".to_string()))?;

        if let Err(e) = element.click().await {
            debug!(error = %e, "Search box click failed");
        }

        let input = if element.tag_name().await?.eq_ignore_ascii_case("input") {
            element
        } else {
            match element.find(By::Tag("input")).await {
                Ok(child) => child,
                Err(_) => element,
            }
        };

        // Select-all + delete so consecutive searches never stack terms.
        let cleared = async {
            input.send_keys(Key::Control + "a").await?;
            sleep(Duration::from_millis(50)).await;
            input.send_keys(Key::Backspace.to_string()).await
        }
        .await;
        if cleared.is_err() {
            if let Err(e) = input.clear().await {
                debug!(error = %e, "Search box clear failed");
            }
        }

        input.send_keys(query).await?;
        sleep(Duration::from_millis(350)).await;
        input.send_keys(Key::Enter.to_string()).await?;
        sleep(Duration::from_secs(1)).await;

        info!("Search submitted");
        Ok(())
    }

    async fn select_latest(&self) -> Result<bool> {
        info!("Selecting Latest tab");
        let driver = self.driver()?;

        let latest = match driver
            .query(By::XPath(LATEST_TAB_XPATH))
            .wait(SHORT_WAIT, POLL_INTERVAL)
            .first_opt()
            .await
        {
            Ok(Some(tab)) => Some(tab),
            _ => driver.find(By::XPath(LATEST_TEXT_XPATH)).await.ok(),
        };

        let Some(tab) = latest else {
            warn!("Latest tab not found");
            return Ok(false);
        };

        click_centered(driver, &tab).await?;
        sleep(Duration::from_secs(1)).await;
        info!("Latest selected");
        Ok(true)
    }

    async fn close(&mut self) -> Result<()> {
        self.shutdown().await;
        Ok(())
    }
}
