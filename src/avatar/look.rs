//! Look options, action identifiers and look-string parsing

use super::{AvatarError, AvatarResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Actions an avatar can perform while being drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AvatarAction {
    Default,
    Move,
    Sit,
    Lay,
    Wave,
    Dance,
    Respect,
    Blink,
    Talk,
    Sleep,
    Sign,
    CarryItem,
    UseItem,
    GestureSmile,
    GestureSad,
    GestureAngry,
    GestureSurprised,
}

impl AvatarAction {
    pub const ALL: [AvatarAction; 17] = [
        AvatarAction::Default,
        AvatarAction::Move,
        AvatarAction::Sit,
        AvatarAction::Lay,
        AvatarAction::Wave,
        AvatarAction::Dance,
        AvatarAction::Respect,
        AvatarAction::Blink,
        AvatarAction::Talk,
        AvatarAction::Sleep,
        AvatarAction::Sign,
        AvatarAction::CarryItem,
        AvatarAction::UseItem,
        AvatarAction::GestureSmile,
        AvatarAction::GestureSad,
        AvatarAction::GestureAngry,
        AvatarAction::GestureSurprised,
    ];

    /// Identifier used in asset names and cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            AvatarAction::Default => "std",
            AvatarAction::Move => "mv",
            AvatarAction::Sit => "sit",
            AvatarAction::Lay => "lay",
            AvatarAction::Wave => "wave",
            AvatarAction::Dance => "dance",
            AvatarAction::Respect => "respect",
            AvatarAction::Blink => "eyb",
            AvatarAction::Talk => "talk",
            AvatarAction::Sleep => "sleep",
            AvatarAction::Sign => "sign",
            AvatarAction::CarryItem => "crr",
            AvatarAction::UseItem => "drk",
            AvatarAction::GestureSmile => "sml",
            AvatarAction::GestureSad => "sad",
            AvatarAction::GestureAngry => "agr",
            AvatarAction::GestureSurprised => "srp",
        }
    }
}

impl fmt::Display for AvatarAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AvatarAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AvatarAction::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown avatar action: {}", s))
    }
}

/// Everything that determines how one avatar pose is drawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookOptions {
    pub actions: BTreeSet<AvatarAction>,
    pub direction: u8,
    pub head_direction: u8,
    pub look: String,
    pub item: Option<i32>,
    pub effect: Option<String>,
    /// Set by the renderer for the first paint of an avatar; not part of the cache key.
    #[serde(default)]
    pub initial: bool,
    /// Resolve without storing the draw definition; not part of the cache key.
    #[serde(default)]
    pub skip_caching: bool,
}

impl LookOptions {
    pub fn new(look: impl Into<String>, direction: u8) -> Self {
        Self {
            actions: BTreeSet::new(),
            direction,
            head_direction: direction,
            look: look.into(),
            item: None,
            effect: None,
            initial: false,
            skip_caching: false,
        }
    }

    pub fn with_head_direction(mut self, head_direction: u8) -> Self {
        self.head_direction = head_direction;
        self
    }

    pub fn with_action(mut self, action: AvatarAction) -> Self {
        self.actions.insert(action);
        self
    }

    pub fn with_item(mut self, item: i32) -> Self {
        self.item = Some(item);
        self
    }

    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.effect = Some(effect.into());
        self
    }

    pub fn validate(&self) -> AvatarResult<()> {
        for direction in [self.direction, self.head_direction] {
            if direction > 7 {
                return Err(AvatarError::InvalidDirection { direction });
            }
        }

        if self.look.trim().is_empty() {
            return Err(AvatarError::InvalidLook { key: self.cache_key() });
        }

        Ok(())
    }

    /// Canonical draw-definition cache key.
    ///
    /// Only actions, directions, item, look and effect contribute. Actions are
    /// emitted sorted by identifier so that insertion order never matters.
    pub fn cache_key(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(6);

        if !self.actions.is_empty() {
            let mut ids: Vec<&str> = self.actions.iter().map(AvatarAction::as_str).collect();
            ids.sort_unstable();
            parts.push(format!("actions({})", ids.join(",")));
        }

        parts.push(format!("direction({})", self.direction));
        parts.push(format!("headDirection({})", self.head_direction));

        if let Some(item) = self.item {
            parts.push(format!("item({})", item));
        }

        parts.push(format!("look({})", self.look));

        if let Some(effect) = &self.effect {
            parts.push(format!("effect({})", effect));
        }

        parts.join(",")
    }

    /// Rebuild the key-relevant fields from a string made by [`LookOptions::cache_key`].
    pub fn from_cache_key(key: &str) -> Option<Self> {
        let mut options = LookOptions::new(String::new(), 0);
        let mut saw_direction = false;
        let mut saw_head_direction = false;
        let mut rest = key;

        while !rest.is_empty() {
            let open = rest.find('(')?;
            let close = open + rest[open..].find(')')?;
            let name = &rest[..open];
            let value = &rest[open + 1..close];

            match name {
                "actions" => {
                    for id in value.split(',') {
                        options.actions.insert(id.parse().ok()?);
                    }
                }
                "direction" => {
                    options.direction = value.parse().ok()?;
                    saw_direction = true;
                }
                "headDirection" => {
                    options.head_direction = value.parse().ok()?;
                    saw_head_direction = true;
                }
                "item" => options.item = Some(value.parse().ok()?),
                "look" => options.look = value.to_string(),
                "effect" => options.effect = Some(value.to_string()),
                _ => return None,
            }

            rest = &rest[close + 1..];
            if let Some(stripped) = rest.strip_prefix(',') {
                rest = stripped;
            }
        }

        (saw_direction && saw_head_direction).then_some(options)
    }
}

/// One `type-setId[-color1[-color2]]` segment of a look string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookPart {
    pub kind: String,
    pub set_id: u32,
    pub colors: Vec<u32>,
}

pub fn parse_look_string(look: &str) -> Vec<LookPart> {
    look.split('.')
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| {
            let mut fields = segment.split('-');
            let kind = fields.next()?.to_string();
            let set_id = match fields.next().map(str::parse::<u32>) {
                Some(Ok(set_id)) => set_id,
                _ => {
                    debug!("Skipping malformed look segment {:?}", segment);
                    return None;
                }
            };
            let colors = fields.filter_map(|color| color.parse().ok()).collect();

            Some(LookPart { kind, set_id, colors })
        })
        .collect()
}
