//! Tenant branding derived from [`TenantInfo`].

use crate::models::TenantInfo;
use std::fmt;

/// Suffix of every page title.
pub const TITLE_SUFFIX: &str = "Civvy Resident";

/// Per-channel offsets for each shade step; positive lightens, negative darkens.
const SHADE_STEPS: [(u16, i16); 10] = [
    (50, 200),
    (100, 150),
    (200, 100),
    (300, 50),
    (400, 25),
    (500, 0),
    (600, -25),
    (700, -50),
    (800, -75),
    (900, -100),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parse `#rrggbb` or `rrggbb`, case-insensitive.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// Shift every channel by `delta`, saturating at 0 and 255.
    #[must_use]
    pub fn shifted(self, delta: i16) -> Self {
        let shift = |c: u8| {
            let shifted = (i16::from(c) + delta).clamp(0, 255);
            u8::try_from(shifted).unwrap_or(u8::MAX)
        };
        Self {
            r: shift(self.r),
            g: shift(self.g),
            b: shift(self.b),
        }
    }

    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Shades 50..900 of the tenant's primary colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    /// The colour exactly as configured by the tenant.
    pub primary: String,
    pub shades: Vec<(u16, Rgb)>,
}

impl Palette {
    /// `None` if `primary` is not a hex colour.
    #[must_use]
    pub fn generate(primary: &str) -> Option<Self> {
        let base = Rgb::from_hex(primary)?;
        let shades = SHADE_STEPS
            .iter()
            .map(|&(shade, delta)| (shade, base.shifted(delta)))
            .collect();
        Some(Self {
            primary: primary.to_owned(),
            shades,
        })
    }

    #[must_use]
    pub fn shade(&self, shade: u16) -> Option<Rgb> {
        self.shades
            .iter()
            .find(|(s, _)| *s == shade)
            .map(|(_, rgb)| *rgb)
    }

    /// CSS custom properties: `--color-primary` and `--color-primary-{shade}`.
    ///
    /// Shade 500 carries the configured colour verbatim.
    #[must_use]
    pub fn css_variables(&self) -> Vec<(String, String)> {
        let mut vars = vec![("--color-primary".to_owned(), self.primary.clone())];
        vars.extend(self.shades.iter().map(|(shade, rgb)| {
            let value = if *shade == 500 {
                self.primary.clone()
            } else {
                rgb.to_string()
            };
            (format!("--color-primary-{shade}"), value)
        }));
        vars
    }
}

/// Everything the view layer needs to brand the portal for a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandingTheme {
    pub title: String,
    pub logo_url: Option<String>,
    /// Absent when the tenant has no valid primary colour.
    pub palette: Option<Palette>,
}

impl BrandingTheme {
    #[must_use]
    pub fn from_tenant(tenant: &TenantInfo) -> Self {
        Self {
            title: format!("{} - {TITLE_SUFFIX}", tenant.display_name()),
            logo_url: tenant.logo_url.clone(),
            palette: tenant.primary_color.as_deref().and_then(Palette::generate),
        }
    }
}
