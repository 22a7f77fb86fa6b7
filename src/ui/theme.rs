use ratatui::style::Color;

/// Palette used by rendering code.
///
/// All colors are [`ratatui::style::Color`] values suitable for direct use with
/// widgets and styles.
#[derive(Clone, Copy)]
pub struct Theme {
    /// Canvas background.
    pub base: Color,
    /// Background of the selected row.
    pub surface1: Color,
    /// Borders and low-emphasis separators.
    pub overlay1: Color,
    /// Primary foreground text.
    pub text: Color,
    /// Secondary text such as build strings and labels.
    pub subtext0: Color,
    /// Interactive highlights: focused filter, selection marker.
    pub sapphire: Color,
    /// Headings.
    pub mauve: Color,
    /// Healthy channel, info notices.
    pub green: Color,
    /// Warnings.
    pub yellow: Color,
    /// Errors.
    pub red: Color,
}

/// Catppuccin Mocha.
const MOCHA: Theme = Theme {
    base: Color::Rgb(30, 30, 46),        // #1e1e2e
    surface1: Color::Rgb(69, 71, 90),    // #45475a
    overlay1: Color::Rgb(127, 132, 156), // #7f849c
    text: Color::Rgb(205, 214, 244),     // #cdd6f4
    subtext0: Color::Rgb(166, 173, 200), // #a6adc8
    sapphire: Color::Rgb(116, 199, 236), // #74c7ec
    mauve: Color::Rgb(203, 166, 247),    // #cba6f7
    green: Color::Rgb(166, 227, 161),    // #a6e3a1
    yellow: Color::Rgb(249, 226, 175),   // #f9e2af
    red: Color::Rgb(243, 139, 168),      // #f38ba8
};

/// Active palette.
#[must_use]
pub const fn theme() -> Theme {
    MOCHA
}
