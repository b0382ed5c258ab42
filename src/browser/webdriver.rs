use crate::error::SessionError;
use crate::session::{Key, PortalPage, Scope};
use async_trait::async_trait;
use thirtyfour::prelude::*;
use url::Url;

/// Zoom level that makes the portal render every lazily loaded card
const MATERIALIZE_ZOOM: &str = "0.05";
const NORMAL_ZOOM: &str = "1.00";

impl From<WebDriverError> for SessionError {
    fn from(e: WebDriverError) -> Self {
        SessionError::WebDriver(e.to_string())
    }
}

fn to_webdriver_key(key: Key) -> thirtyfour::Key {
    match key {
        Key::Control => thirtyfour::Key::Control,
        Key::ArrowLeft => thirtyfour::Key::Left,
    }
}

/// `PortalPage` over a live WebDriver session.
///
/// Frame scopes refer to the top-level document's iframes in DOM order. Every
/// call switches into its scope and back to the top-level document afterwards,
/// so no call depends on where the previous one left the session.
pub struct WebDriverPage<'a> {
    driver: &'a WebDriver,
}

impl<'a> WebDriverPage<'a> {
    pub fn new(driver: &'a WebDriver) -> Self {
        Self { driver }
    }

    /// Cookies of the current session as `(name, value)` pairs.
    pub async fn session_cookies(&self) -> Result<Vec<(String, String)>, SessionError> {
        let cookies = self.driver.get_all_cookies().await?;
        Ok(cookies
            .iter()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect())
    }

    pub async fn user_agent(&self) -> Result<String, SessionError> {
        let ret = self.driver.execute("return navigator.userAgent;", Vec::new()).await?;
        ret.json()
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SessionError::Script("navigator.userAgent is not a string".to_string()))
    }

    async fn set_zoom(&self, zoom: &str) -> Result<(), SessionError> {
        self.driver.enter_default_frame().await?;
        let script = format!("document.body.style.zoom = '{}';", zoom);
        self.driver.execute(&script, Vec::new()).await?;
        Ok(())
    }

    async fn enter(&self, scope: Scope) -> Result<(), SessionError> {
        self.driver.enter_default_frame().await?;
        if let Scope::Frame(index) = scope {
            let index = u16::try_from(index)
                .map_err(|_| SessionError::WebDriver(format!("frame index {} out of range", index)))?;
            self.driver.enter_frame(index).await?;
        }
        Ok(())
    }

    async fn leave(&self, scope: Scope) {
        if scope != Scope::Page {
            if let Err(e) = self.driver.enter_default_frame().await {
                tracing::debug!(error = %e, "could not return to top-level document");
            }
        }
    }

    async fn nth_element(&self, css: &str, index: usize) -> Result<WebElement, SessionError> {
        let mut elements = self.driver.find_all(By::Css(css)).await?;
        if index < elements.len() {
            Ok(elements.swap_remove(index))
        } else {
            Err(SessionError::ElementNotFound {
                selector: css.to_string(),
                index,
            })
        }
    }

    async fn first_outer_html(&self, css: &str) -> Result<Option<String>, SessionError> {
        let elements = self.driver.find_all(By::Css(css)).await?;
        match elements.first() {
            Some(element) => Ok(Some(element.outer_html().await?)),
            None => Ok(None),
        }
    }

    async fn all_texts(&self, css: &str) -> Result<Vec<String>, SessionError> {
        let mut texts = Vec::new();
        for element in self.driver.find_all(By::Css(css)).await? {
            texts.push(element.text().await?);
        }
        Ok(texts)
    }

    /// Enter `scope`, fetch the `index`-th match of `css`, run `op` on it,
    /// and return to the top-level document whatever the outcome.
    async fn with_element<T, F, Fut>(&self, scope: Scope, css: &str, index: usize, op: F) -> Result<T, SessionError>
    where
        F: FnOnce(WebElement) -> Fut,
        Fut: std::future::Future<Output = Result<T, SessionError>>,
    {
        self.enter(scope).await?;
        let result = match self.nth_element(css, index).await {
            Ok(element) => op(element).await,
            Err(e) => Err(e),
        };
        self.leave(scope).await;
        result
    }
}

#[async_trait]
impl<'a> PortalPage for WebDriverPage<'a> {
    async fn current_url(&self) -> Result<Url, SessionError> {
        Ok(self.driver.current_url().await?)
    }

    async fn ensure_fully_rendered(&self) -> Result<(), SessionError> {
        self.set_zoom(MATERIALIZE_ZOOM).await
    }

    async fn restore_rendering(&self) -> Result<(), SessionError> {
        self.set_zoom(NORMAL_ZOOM).await
    }

    async fn count(&self, scope: Scope, css: &str) -> Result<usize, SessionError> {
        self.enter(scope).await?;
        let found = self.driver.find_all(By::Css(css)).await;
        self.leave(scope).await;
        Ok(found?.len())
    }

    async fn outer_html(&self, scope: Scope, css: &str) -> Result<Option<String>, SessionError> {
        self.enter(scope).await?;
        let result = self.first_outer_html(css).await;
        self.leave(scope).await;
        result
    }

    async fn texts(&self, scope: Scope, css: &str) -> Result<Vec<String>, SessionError> {
        self.enter(scope).await?;
        let result = self.all_texts(css).await;
        self.leave(scope).await;
        result
    }

    async fn frame_count(&self) -> Result<usize, SessionError> {
        self.driver.enter_default_frame().await?;
        Ok(self.driver.find_all(By::Tag("iframe")).await?.len())
    }

    async fn click(&self, scope: Scope, css: &str, index: usize) -> Result<(), SessionError> {
        self.with_element(scope, css, index, |element| async move {
            element.scroll_into_view().await?;
            element.click().await?;
            Ok::<_, SessionError>(())
        })
        .await
    }

    async fn fill(&self, scope: Scope, css: &str, value: &str) -> Result<(), SessionError> {
        let driver = self.driver;
        self.with_element(scope, css, 0, |element| async move {
            element.click().await?;
            element.clear().await?;
            // React-controlled inputs can keep their value after clear()
            driver
                .action_chain()
                .click_element(&element)
                .key_down(thirtyfour::Key::Control)
                .send_keys("a")
                .key_up(thirtyfour::Key::Control)
                .key_down(thirtyfour::Key::Backspace)
                .key_up(thirtyfour::Key::Backspace)
                .perform()
                .await?;
            element.send_keys(value).await?;
            Ok::<_, SessionError>(())
        })
        .await
    }

    async fn is_checked(&self, scope: Scope, css: &str) -> Result<bool, SessionError> {
        self.with_element(scope, css, 0, |element| async move {
            match element.attr("aria-checked").await? {
                Some(state) => Ok::<_, SessionError>(state.eq_ignore_ascii_case("true")),
                None => Ok(element.is_selected().await?),
            }
        })
        .await
    }

    async fn focus(&self, scope: Scope, css: &str, index: usize) -> Result<(), SessionError> {
        let driver = self.driver;
        self.with_element(scope, css, index, |element| async move {
            element.scroll_into_view().await?;
            driver
                .execute("arguments[0].focus();", vec![element.to_json()?])
                .await?;
            Ok::<_, SessionError>(())
        })
        .await
    }

    async fn send_chord(&self, modifiers: &[Key], key: Key) -> Result<(), SessionError> {
        let mut chain = self.driver.action_chain();
        for modifier in modifiers {
            chain = chain.key_down(to_webdriver_key(*modifier));
        }
        chain = chain
            .key_down(to_webdriver_key(key))
            .key_up(to_webdriver_key(key));
        for modifier in modifiers.iter().rev() {
            chain = chain.key_up(to_webdriver_key(*modifier));
        }
        chain.perform().await?;
        Ok(())
    }
}
