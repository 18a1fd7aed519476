use serenity::all::{ButtonStyle, CreateActionRow, CreateButton, ReactionType};

/// A player control attached to the now playing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Shuffle,
    Skip,
    Pause,
    Resume,
}

impl ButtonAction {
    pub const ALL: [ButtonAction; 4] = [
        ButtonAction::Shuffle,
        ButtonAction::Skip,
        ButtonAction::Pause,
        ButtonAction::Resume,
    ];

    pub fn custom_id(self) -> &'static str {
        match self {
            ButtonAction::Shuffle => "music_shuffle",
            ButtonAction::Skip => "music_skip",
            ButtonAction::Pause => "music_pause",
            ButtonAction::Resume => "music_resume",
        }
    }

    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.custom_id() == custom_id)
    }

    fn button(self) -> CreateButton {
        let (label, emoji, style) = match self {
            ButtonAction::Shuffle => ("Shuffle", "🔀", ButtonStyle::Primary),
            ButtonAction::Skip => ("Skip", "⏭️", ButtonStyle::Secondary),
            ButtonAction::Pause => ("Pause", "⏸️", ButtonStyle::Danger),
            ButtonAction::Resume => ("Resume", "▶️", ButtonStyle::Success),
        };

        CreateButton::new(self.custom_id())
            .emoji(ReactionType::Unicode(emoji.to_string()))
            .style(style)
            .label(label)
    }
}

/// Creates a row of music control buttons
pub fn create_music_control_buttons() -> Vec<CreateActionRow> {
    let buttons = ButtonAction::ALL.into_iter().map(ButtonAction::button).collect();
    vec![CreateActionRow::Buttons(buttons)]
}
