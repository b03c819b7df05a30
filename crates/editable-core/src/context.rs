//! Input-method context reported by the engine for the focused editable.

pub const IME_STATE_UNKNOWN: i32 = -1;
pub const IME_STATE_DISABLED: i32 = 0;
pub const IME_STATE_ENABLED: i32 = 1;
pub const IME_STATE_PASSWORD: i32 = 2;

pub const IME_FLAG_USER_ACTION: u32 = 2;
pub const IME_FOCUS_NOT_CHANGED: u32 = 4;

/// Keyboard layout class the host should request for the editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    None,
    Text,
    Password,
    Number,
    Decimal,
    Phone,
    Email,
    Url,
    Search,
    DateTime,
}

/// What the UI thread should do with the soft keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardRequest {
    Show,
    Hide,
    /// Keep visibility, but restart input so the new input type applies.
    Restart,
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImeContext {
    pub state: i32,
    pub type_hint: String,
    pub mode_hint: String,
    pub action_hint: String,
    pub flags: u32,
}

impl Default for ImeContext {
    fn default() -> Self {
        Self {
            state: IME_STATE_DISABLED,
            type_hint: String::new(),
            mode_hint: String::new(),
            action_hint: String::new(),
            flags: 0,
        }
    }
}

impl ImeContext {
    pub fn is_enabled(&self) -> bool {
        self.state != IME_STATE_DISABLED && self.state != IME_STATE_UNKNOWN
    }

    /// `inputmode` takes precedence over the element type, except for passwords.
    pub fn input_type(&self) -> InputType {
        if !self.is_enabled() {
            return InputType::None;
        }
        if self.state == IME_STATE_PASSWORD || self.type_hint == "password" {
            return InputType::Password;
        }
        match self.mode_hint.as_str() {
            "none" => return InputType::None,
            "numeric" => return InputType::Number,
            "decimal" => return InputType::Decimal,
            "tel" => return InputType::Phone,
            "email" => return InputType::Email,
            "url" => return InputType::Url,
            "search" => return InputType::Search,
            "text" => return InputType::Text,
            _ => {}
        }
        match self.type_hint.as_str() {
            "number" | "range" => InputType::Number,
            "tel" => InputType::Phone,
            "email" => InputType::Email,
            "url" => InputType::Url,
            "search" => InputType::Search,
            "date" | "time" | "datetime-local" | "month" | "week" => InputType::DateTime,
            _ => InputType::Text,
        }
    }

    /// Keyboard decision when moving from `previous` to this context.
    pub fn keyboard_request(&self, previous: &ImeContext) -> KeyboardRequest {
        if !self.is_enabled() || self.input_type() == InputType::None {
            return KeyboardRequest::Hide;
        }
        if self.flags & IME_FLAG_USER_ACTION != 0 {
            return KeyboardRequest::Show;
        }
        if self.flags & IME_FOCUS_NOT_CHANGED == 0 && self.input_type() != previous.input_type() {
            return KeyboardRequest::Restart;
        }
        KeyboardRequest::Keep
    }
}
