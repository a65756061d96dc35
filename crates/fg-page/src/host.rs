// host.rs — What the pipeline needs from the page it runs in.
//
// `PageHost` is the window: current location, replace-navigation, and the
// restricted banner. `ReasonChannel` is the session-scoped, one-shot slot
// that carries a redirect reason across the navigation it causes: written
// before the redirect, taken (and cleared) by the next page load.

use std::cell::RefCell;

use url::Url;

/// The window the pipeline is running in.
pub trait PageHost {
    /// The current location.
    fn location(&self) -> Url;

    /// Navigate to `url`, replacing the current history entry.
    fn replace_location(&self, url: &Url);

    /// Show the restricted-mode banner, with an optional one-line message.
    fn show_banner(&self, _message: Option<&str>) {}
}

/// One-shot, session-scoped redirect reason.
pub trait ReasonChannel {
    /// Store `reason`, replacing any unread one.
    fn post(&self, reason: &str);

    /// Read and clear the stored reason.
    fn take(&self) -> Option<String>;
}

/// In-process [`ReasonChannel`].
#[derive(Debug, Default)]
pub struct SessionReasonSlot {
    slot: RefCell<Option<String>>,
}

impl SessionReasonSlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReasonChannel for SessionReasonSlot {
    fn post(&self, reason: &str) {
        *self.slot.borrow_mut() = Some(reason.to_string());
    }

    fn take(&self) -> Option<String> {
        self.slot.borrow_mut().take()
    }
}

/// In-process [`PageHost`] recording every navigation and banner call.
///
/// `replace_location()` updates the location immediately, the way a
/// same-origin SPA transition would appear to a content script.
#[derive(Debug)]
pub struct MemoryHost {
    location: RefCell<Url>,
    replaced: RefCell<Vec<Url>>,
    banners: RefCell<Vec<Option<String>>>,
}

impl MemoryHost {
    pub fn new(location: Url) -> Self {
        Self {
            location: RefCell::new(location),
            replaced: RefCell::new(Vec::new()),
            banners: RefCell::new(Vec::new()),
        }
    }

    /// Move the location without going through `replace_location()`
    /// (a link click, a pushState, the back button).
    pub fn set_location(&self, location: Url) {
        *self.location.borrow_mut() = location;
    }

    /// Every URL passed to `replace_location()`, oldest first.
    pub fn replaced(&self) -> Vec<Url> {
        self.replaced.borrow().clone()
    }

    /// Every banner shown, oldest first.
    pub fn banners(&self) -> Vec<Option<String>> {
        self.banners.borrow().clone()
    }
}

impl PageHost for MemoryHost {
    fn location(&self) -> Url {
        self.location.borrow().clone()
    }

    fn replace_location(&self, url: &Url) {
        self.replaced.borrow_mut().push(url.clone());
        *self.location.borrow_mut() = url.clone();
    }

    fn show_banner(&self, message: Option<&str>) {
        self.banners.borrow_mut().push(message.map(str::to_string));
    }
}
