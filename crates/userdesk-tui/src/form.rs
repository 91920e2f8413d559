//! Keyboard-driven form state shared by the login, register and edit overlays.

use userdesk_core::validation::FieldErrors;

/// Maximum length for free text input.
/// Covers long names and email addresses.
const MAX_TEXT_LENGTH: usize = 100;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_SECRET_LENGTH: usize = 128;

/// Maximum length for a file path
const MAX_PATH_LENGTH: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Secret,
    Path,
    /// One of a fixed set of values, cycled with space/arrows
    Choice(&'static [&'static str]),
}

impl FieldKind {
    fn max_len(&self) -> usize {
        match self {
            FieldKind::Text => MAX_TEXT_LENGTH,
            FieldKind::Secret => MAX_SECRET_LENGTH,
            FieldKind::Path => MAX_PATH_LENGTH,
            FieldKind::Choice(_) => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub value: String,
    pub error: Option<String>,
}

impl FormField {
    pub fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        let value = match kind {
            FieldKind::Choice(options) => options.first().copied().unwrap_or_default().to_string(),
            _ => String::new(),
        };
        Self {
            name,
            label,
            kind,
            value,
            error: None,
        }
    }

    /// Value as shown on screen (secrets masked)
    pub fn display_value(&self) -> String {
        match self.kind {
            FieldKind::Secret => "*".repeat(self.value.chars().count()),
            _ => self.value.clone(),
        }
    }
}

/// Check if a character should be accepted at the given length
pub fn can_add_char(kind: FieldKind, current_len: usize, c: char) -> bool {
    current_len < kind.max_len() && !c.is_control()
}

/// A vertical list of fields followed by a submit button.
/// `focus == fields.len()` means the button has focus.
#[derive(Debug, Clone)]
pub struct Form {
    pub fields: Vec<FormField>,
    pub focus: usize,
    pub general_error: Option<String>,
    pub submitting: bool,
}

impl Form {
    pub fn new(fields: Vec<FormField>) -> Self {
        Self {
            fields,
            focus: 0,
            general_error: None,
            submitting: false,
        }
    }

    pub fn login() -> Self {
        Self::new(vec![
            FormField::new("email", "Email", FieldKind::Text),
            FormField::new("password", "Password", FieldKind::Secret),
        ])
    }

    pub fn registration() -> Self {
        Self::new(vec![
            FormField::new("name", "Name", FieldKind::Text),
            FormField::new("email", "Email", FieldKind::Text),
            FormField::new("password", "Password", FieldKind::Secret),
            FormField::new("confirmPassword", "Confirm", FieldKind::Secret),
            FormField::new("role", "Role", FieldKind::Choice(&["user", "admin"])),
            FormField::new("image", "Image", FieldKind::Path),
        ])
    }

    pub fn edit() -> Self {
        Self::new(vec![
            FormField::new("name", "Name", FieldKind::Text),
            FormField::new("email", "Email", FieldKind::Text),
            FormField::new("role", "Role", FieldKind::Choice(&["user", "admin"])),
        ])
    }

    pub fn on_button(&self) -> bool {
        self.focus >= self.fields.len()
    }

    pub fn focused(&self) -> Option<&FormField> {
        self.fields.get(self.focus)
    }

    fn focused_mut(&mut self) -> Option<&mut FormField> {
        self.fields.get_mut(self.focus)
    }

    pub fn focused_name(&self) -> Option<&'static str> {
        self.focused().map(|f| f.name)
    }

    pub fn next(&mut self) {
        self.focus = (self.focus + 1) % (self.fields.len() + 1);
    }

    pub fn prev(&mut self) {
        let slots = self.fields.len() + 1;
        self.focus = (self.focus + slots - 1) % slots;
    }

    pub fn focus_field(&mut self, name: &str) {
        if let Some(idx) = self.fields.iter().position(|f| f.name == name) {
            self.focus = idx;
        }
    }

    /// Type a character into the focused field. Editing a field clears its error.
    pub fn push_char(&mut self, c: char) {
        let Some(field) = self.focused_mut() else {
            return;
        };
        match field.kind {
            FieldKind::Choice(_) => {
                if c == ' ' {
                    self.cycle_choice();
                }
            }
            kind => {
                if can_add_char(kind, field.value.chars().count(), c) {
                    field.value.push(c);
                    field.error = None;
                }
            }
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.focused_mut() {
            if !matches!(field.kind, FieldKind::Choice(_)) && field.value.pop().is_some() {
                field.error = None;
            }
        }
    }

    /// Advance the focused choice field to its next option
    pub fn cycle_choice(&mut self) {
        if let Some(field) = self.focused_mut() {
            if let FieldKind::Choice(options) = field.kind {
                let idx = options.iter().position(|o| *o == field.value).unwrap_or(0);
                field.value = options[(idx + 1) % options.len()].to_string();
                field.error = None;
            }
        }
    }

    pub fn value(&self, name: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
            .unwrap_or("")
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<String>) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.name == name) {
            field.value = value.into();
        }
    }

    pub fn set_error(&mut self, name: &str, error: Option<String>) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.name == name) {
            field.error = error;
        }
    }

    /// Replace all field errors. Errors for unknown fields go to the banner.
    pub fn set_errors(&mut self, errors: &FieldErrors) {
        for field in &mut self.fields {
            field.error = errors.get(field.name).cloned();
        }
        self.general_error = errors
            .iter()
            .find(|(name, _)| !self.fields.iter().any(|f| f.name == name.as_str()))
            .map(|(_, msg)| msg.clone());
    }

    pub fn has_errors(&self) -> bool {
        self.general_error.is_some() || self.fields.iter().any(|f| f.error.is_some())
    }

    /// Focus the first field with an error
    pub fn focus_first_error(&mut self) {
        if let Some(idx) = self.fields.iter().position(|f| f.error.is_some()) {
            self.focus = idx;
        }
    }

    /// Clear values, errors and focus. Choice fields return to their first option.
    pub fn reset(&mut self) {
        for field in &mut self.fields {
            *field = FormField::new(field.name, field.label, field.kind);
        }
        self.focus = 0;
        self.general_error = None;
        self.submitting = false;
    }

    /// Clear secret fields only (after a failed login, say)
    pub fn clear_secrets(&mut self) {
        for field in &mut self.fields {
            if field.kind == FieldKind::Secret {
                field.value.clear();
            }
        }
    }
}
