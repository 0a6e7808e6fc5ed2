use ratatui::layout::Rect;
use ratatui::widgets::ListState;

use askai_core::{
    ChatMessage, Config, ConversationId, ConversationStore, ExchangeController, ExchangeStatus,
    GeminiClient, JsonFileRepository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Chat,
    Input,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Sidebar => FocusPane::Chat,
            FocusPane::Chat => FocusPane::Input,
            FocusPane::Input => FocusPane::Sidebar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// What the chat view last saw of the store, to notice changes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewSnapshot {
    active: Option<ConversationId>,
    message_count: usize,
    sending: bool,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub theme: Theme,
    pub show_sidebar: bool,

    // Conversations and the request in flight
    pub store: ConversationStore<JsonFileRepository>,
    pub exchange: ExchangeController<GeminiClient>,
    pub config: Config,

    // Sidebar state
    pub sidebar_state: ListState,

    // Message input
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_tail: bool,
    view: ViewSnapshot,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Rename popup state
    pub show_rename_input: bool,
    pub rename_input: String,
    pub rename_cursor: usize,
    pub rename_target: Option<ConversationId>,

    // API key input state
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,

    // Last problem worth telling the user about
    pub status_message: Option<String>,

    // Panel areas for mouse hit-testing (updated during render)
    pub sidebar_area: Option<Rect>,
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store_path = match config.store_path.clone() {
            Some(path) => path,
            None => JsonFileRepository::default_path()?,
        };
        tracing::info!(path = %store_path.display(), "opening conversation store");

        let store = ConversationStore::open(JsonFileRepository::new(store_path));
        Ok(Self::from_parts(config, store))
    }

    pub fn from_parts(config: Config, store: ConversationStore<JsonFileRepository>) -> Self {
        if config.resolve_api_key().is_none() {
            tracing::warn!("no Gemini API key configured");
        }

        let exchange = ExchangeController::new(config.gemini_client());
        let theme = config
            .theme
            .as_deref()
            .and_then(Theme::from_str)
            .unwrap_or_default();

        let mut sidebar_state = ListState::default();
        if !store.conversations().is_empty() {
            sidebar_state.select(Some(0));
        }

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,
            theme,
            show_sidebar: true,

            store,
            exchange,
            config,

            sidebar_state,

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_tail: true,
            view: ViewSnapshot::default(),

            animation_frame: 0,

            show_rename_input: false,
            rename_input: String::new(),
            rename_cursor: 0,
            rename_target: None,

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,

            status_message: None,

            sidebar_area: None,
            chat_area: None,
        }
    }

    pub fn is_sending(&self) -> bool {
        self.exchange.status() == ExchangeStatus::Sending
    }

    pub fn active_messages(&self) -> &[ChatMessage] {
        self.store.active_messages()
    }

    pub fn active_title(&self) -> &str {
        self.store
            .active_conversation()
            .map(|c| c.title.as_str())
            .unwrap_or("New conversation")
    }

    pub fn highlighted_conversation(&self) -> Option<ConversationId> {
        self.sidebar_state
            .selected()
            .and_then(|i| self.store.conversations().get(i))
            .map(|c| c.id.clone())
    }

    fn report<E: std::fmt::Display>(&mut self, action: &str, err: E) {
        tracing::error!(error = %err, "{}", action);
        self.status_message = Some(format!("{}: {}", action, err));
    }

    // Conversation actions
    pub fn new_chat(&mut self) {
        if let Err(e) = self.store.create_conversation() {
            self.report("Could not save new chat", e);
        }
        self.sidebar_state.select(Some(0));
        self.focus_input();
    }

    pub fn select_highlighted(&mut self) {
        let Some(id) = self.highlighted_conversation() else {
            return;
        };
        let selected = self.store.select_conversation(&id).map(|_| ());
        if let Err(e) = selected {
            self.report("Could not open chat", e);
            return;
        }
        self.follow_tail = true;
        self.focus_input();
    }

    pub fn delete_highlighted(&mut self) {
        let Some(id) = self.highlighted_conversation() else {
            return;
        };
        if let Err(e) = self.store.delete_conversation(&id) {
            self.report("Could not save after delete", e);
        }

        // Keep the highlight on a neighbouring entry
        let len = self.store.conversations().len();
        if len == 0 {
            self.sidebar_state.select(None);
        } else {
            let i = self.sidebar_state.selected().unwrap_or(0);
            self.sidebar_state.select(Some(i.min(len - 1)));
        }
    }

    pub fn start_rename(&mut self) {
        let Some(id) = self.highlighted_conversation() else {
            return;
        };
        self.rename_input = self
            .store
            .get(&id)
            .map(|c| c.title.clone())
            .unwrap_or_default();
        self.rename_cursor = self.rename_input.chars().count();
        self.rename_target = Some(id);
        self.show_rename_input = true;
    }

    pub fn confirm_rename(&mut self) {
        let title = self.rename_input.trim().to_string();
        if let Some(id) = self.rename_target.take() {
            if !title.is_empty() {
                if let Err(e) = self.store.rename_conversation(&id, &title) {
                    self.report("Could not save title", e);
                }
            }
        }
        self.cancel_rename();
    }

    pub fn cancel_rename(&mut self) {
        self.show_rename_input = false;
        self.rename_input.clear();
        self.rename_cursor = 0;
        self.rename_target = None;
    }

    // Message exchange
    pub fn send_input(&mut self) {
        let text = self.input.clone();
        if self.exchange.begin_send(&mut self.store, &text).is_some() {
            self.input.clear();
            self.input_cursor = 0;
            self.status_message = None;
            self.follow_tail = true;
        }
        self.report_save_error("Could not save message");
    }

    /// Record the reply once the request in flight has finished
    pub async fn poll_reply(&mut self) {
        if self.exchange.poll_reply(&mut self.store).await {
            self.follow_tail = true;
            self.report_save_error("Could not save reply");
        }
    }

    fn report_save_error(&mut self, action: &str) {
        if let Some(e) = self.exchange.take_save_error() {
            self.report(action, e);
        }
    }

    /// Follow the end of the chat whenever the active conversation changes
    /// or grows, and keep the sidebar highlight on it.
    pub fn observe_store(&mut self) {
        let current = ViewSnapshot {
            active: self.store.active_id().cloned(),
            message_count: self.store.active_messages().len(),
            sending: self.is_sending(),
        };
        if current == self.view {
            return;
        }

        if current.active != self.view.active {
            if let Some(index) = current
                .active
                .as_ref()
                .and_then(|id| self.store.conversations().iter().position(|c| &c.id == id))
            {
                self.sidebar_state.select(Some(index));
            }
        }
        self.follow_tail = true;
        self.view = current;
    }

    // Navigation
    pub fn sidebar_down(&mut self) {
        let len = self.store.conversations().len();
        if len > 0 {
            let i = self.sidebar_state.selected().unwrap_or(0);
            self.sidebar_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn sidebar_up(&mut self) {
        if !self.store.conversations().is_empty() {
            let i = self.sidebar_state.selected().unwrap_or(0);
            self.sidebar_state.select(Some(i.saturating_sub(1)));
        }
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_chat_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_tail = false;
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.follow_tail = true;
    }

    pub fn focus_input(&mut self) {
        self.focus = FocusPane::Input;
        self.input_mode = InputMode::Editing;
    }

    pub fn cycle_focus(&mut self) {
        self.focus = self.focus.next();
        if self.focus == FocusPane::Sidebar && !self.show_sidebar {
            self.focus = self.focus.next();
        }
    }

    pub fn toggle_sidebar(&mut self) {
        self.show_sidebar = !self.show_sidebar;
        if !self.show_sidebar && self.focus == FocusPane::Sidebar {
            self.focus = FocusPane::Chat;
        }
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        self.config.theme = Some(self.theme.as_str().to_string());
        if let Err(e) = Config::save_theme(self.theme.as_str()) {
            tracing::warn!(error = %e, "could not save theme");
        }
    }

    // API key popup
    pub fn open_api_key_input(&mut self) {
        self.show_api_key_input = true;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
    }

    pub fn close_api_key_input(&mut self) {
        self.show_api_key_input = false;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
    }

    pub fn confirm_api_key(&mut self) {
        let key = self.api_key_input.trim().to_string();
        if !key.is_empty() {
            if let Err(e) = Config::save_api_key(&key) {
                self.report("Could not save API key", e);
            }
            self.config.api_key = Some(key);
            self.exchange.set_service(self.config.gemini_client());
            tracing::info!("API key updated");
        }
        self.close_api_key_input();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}
