// src/style.rs
//
// =============================================================================
// CHROMALOG: STYLE REGISTRY (v 0.3)
// =============================================================================
//
// Maps (size, bold, italic, colour) tuples to immutable, interned handles.
//
// Responsibilities:
// - Idempotent registration: equal arguments yield the same shared handle.
// - Deterministic CSS class names, so the HTML sink needs one rule per tuple.
// - The colour-cycling palette used by the facade.
//
// The whole enumeration (sizes x variants x colours) is built eagerly at
// startup. A few dozen entries; the later lookups contend on a mutex that
// is effectively never held.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

/// Font family shared by every registered style.
pub const FONT_FAMILY: &str = "Verdana";

/// Point sizes enumerated by the eager registry build.
pub const SIZES: [u8; 2] = [12, 13];

/// Default body size used by the facade.
pub const DEFAULT_SIZE: u8 = 12;

// ============================================================================
// 1. COLOURS
// ============================================================================

/// An sRGB colour. Compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lowercase hex form used in class names and CSS rules.
    pub fn hex(&self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Base colour for plain info text.
pub const BLACK: Colour = Colour::new(0, 0, 0);
/// Base colour for error text and exception traces.
pub const RED: Colour = Colour::new(255, 0, 0);
/// Low-emphasis colour for the date half of the timestamp.
pub const DATE_GREY: Colour = Colour::new(120, 120, 120);
/// Colour of the `Info:` label.
pub const LABEL_GREEN: Colour = Colour::new(0, 150, 0);

/// The ordered highlight palette cycled through by delimited segments.
pub const PALETTE: [Colour; 7] = [
    Colour::new(0, 0, 255),    // blue
    Colour::new(0, 150, 0),    // green
    Colour::new(170, 0, 170),  // magenta
    Colour::new(0, 140, 140),  // teal
    Colour::new(200, 100, 0),  // orange
    Colour::new(150, 75, 0),   // brown
    Colour::new(120, 0, 200),  // violet
];

// ============================================================================
// 2. STYLE HANDLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StyleKey {
    size: u8,
    bold: bool,
    italic: bool,
    colour: Colour,
}

#[derive(Debug, PartialEq, Eq)]
struct StyleData {
    family: &'static str,
    size: u8,
    bold: bool,
    italic: bool,
    colour: Colour,
}

/// Immutable, interned descriptor of one (family, size, weight, slant,
/// colour) combination. Cheap to clone; handles from the same registration
/// share one allocation, so equality is usually a pointer compare.
#[derive(Debug, Clone)]
pub struct StyleHandle(Arc<StyleData>);

impl StyleHandle {
    pub fn size(&self) -> u8 {
        self.0.size
    }

    pub fn bold(&self) -> bool {
        self.0.bold
    }

    pub fn italic(&self) -> bool {
        self.0.italic
    }

    pub fn colour(&self) -> Colour {
        self.0.colour
    }

    /// Derives the CSS class name from the four fields. Identical tuples
    /// always produce the same name, so repeated styles reuse one rule.
    pub fn css_class(&self) -> String {
        format!(
            "s{}{}{}{}",
            self.0.size,
            if self.0.bold { "b" } else { "p" },
            if self.0.italic { "i" } else { "u" },
            self.0.colour.hex()
        )
    }

    /// One CSS rule for this style, keyed by `css_class`.
    fn css_rule(&self) -> String {
        format!(
            ".{} {{ font-family: {}; font-size: {}pt; font-weight: {}; font-style: {}; color: #{}; }}",
            self.css_class(),
            self.0.family,
            self.0.size,
            if self.0.bold { "bold" } else { "normal" },
            if self.0.italic { "italic" } else { "normal" },
            self.0.colour.hex()
        )
    }
}

impl PartialEq for StyleHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for StyleHandle {}

// ============================================================================
// 3. THE REGISTRY
// ============================================================================

/// Interning registry for style handles.
///
/// `register` is idempotent: calling it twice with identical arguments
/// returns the same shared instance.
pub struct StyleRegistry {
    inner: Mutex<HashMap<StyleKey, StyleHandle>>,
}

impl StyleRegistry {
    /// Builds the full cross product of sizes, weight/slant variants, and
    /// the base + palette colours.
    pub fn new() -> Self {
        let mut map = HashMap::new();

        let mut colours = vec![BLACK, RED, DATE_GREY, LABEL_GREEN];
        colours.extend(PALETTE);

        for size in SIZES {
            for bold in [false, true] {
                for italic in [false, true] {
                    for colour in &colours {
                        let key = StyleKey {
                            size,
                            bold,
                            italic,
                            colour: *colour,
                        };
                        map.entry(key).or_insert_with(|| {
                            StyleHandle(Arc::new(StyleData {
                                family: FONT_FAMILY,
                                size,
                                bold,
                                italic,
                                colour: *colour,
                            }))
                        });
                    }
                }
            }
        }

        Self {
            inner: Mutex::new(map),
        }
    }

    pub fn register(&self, size: u8, bold: bool, italic: bool, colour: Colour) -> StyleHandle {
        let key = StyleKey {
            size,
            bold,
            italic,
            colour,
        };

        let mut map = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(key)
            .or_insert_with(|| {
                StyleHandle(Arc::new(StyleData {
                    family: FONT_FAMILY,
                    size,
                    bold,
                    italic,
                    colour,
                }))
            })
            .clone()
    }

    /// Convenience for the facade: plain body style in the given colour.
    pub fn plain(&self, colour: Colour) -> StyleHandle {
        self.register(DEFAULT_SIZE, false, false, colour)
    }

    /// Convenience for the facade: bold-italic label style.
    pub fn label(&self, colour: Colour) -> StyleHandle {
        self.register(DEFAULT_SIZE, true, true, colour)
    }

    /// Renders the `<style>` block for the HTML prologue: one rule per
    /// registered tuple, sorted so output is deterministic.
    pub fn style_block(&self) -> String {
        let map = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut rules: Vec<String> = map.values().map(|h| h.css_rule()).collect();
        rules.sort();

        let mut block = String::from("<style>\n");
        for rule in rules {
            let _ = writeln!(block, "{}", rule);
        }
        block.push_str("</style>");
        block
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
