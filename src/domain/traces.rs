//! Write-side trace bundle and its validation rules.

use serde::Deserialize;

use super::{entities::PhantomFrame, error::DomainError};

pub const MAX_OWNER_LEN: usize = 64;
pub const MAX_MESSAGE_PART_LEN: usize = 512;
pub const DEFAULT_MAX_PHANTOM_FRAMES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewGameObject {
    pub u_uuid: String,
    pub o_type: i32,
    pub o_pos: String,
    pub o_rot: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewMessage {
    pub u_uuid: String,
    pub part1: String,
    pub part2: String,
    pub part3: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewPhantom {
    pub u_uuid: String,
    pub data: Vec<PhantomFrame>,
}

/// A bundle as received, before any rule has been checked.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TraceBundleDraft {
    #[serde(default, rename = "obj")]
    pub object: Option<NewGameObject>,
    #[serde(default)]
    pub message: Option<NewMessage>,
    #[serde(default)]
    pub phantom: Option<NewPhantom>,
}

/// A bundle that passed validation and may be persisted as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTraceBundle {
    pub object: Option<NewGameObject>,
    pub message: Option<NewMessage>,
    pub phantom: NewPhantom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleLimits {
    pub max_phantom_frames: usize,
}

impl Default for BundleLimits {
    fn default() -> Self {
        Self {
            max_phantom_frames: DEFAULT_MAX_PHANTOM_FRAMES,
        }
    }
}

impl TraceBundleDraft {
    pub fn validate(self, limits: &BundleLimits) -> Result<NewTraceBundle, DomainError> {
        let Some(phantom) = self.phantom else {
            return Err(DomainError::validation("bundle must include a phantom"));
        };
        if self.object.is_none() && self.message.is_none() {
            return Err(DomainError::validation(
                "bundle must include an object or a message",
            ));
        }

        if let Some(object) = self.object.as_ref() {
            validate_owner("obj.u_uuid", &object.u_uuid)?;
            validate_vector("obj.o_pos", &object.o_pos)?;
            validate_vector("obj.o_rot", &object.o_rot)?;
        }

        if let Some(message) = self.message.as_ref() {
            validate_owner("message.u_uuid", &message.u_uuid)?;
            for (field, part) in [
                ("message.part1", &message.part1),
                ("message.part2", &message.part2),
                ("message.part3", &message.part3),
            ] {
                reject_nul(field, part)?;
                if part.chars().count() > MAX_MESSAGE_PART_LEN {
                    return Err(DomainError::validation(format!(
                        "`{field}` exceeds {MAX_MESSAGE_PART_LEN} characters"
                    )));
                }
            }
        }

        validate_owner("phantom.u_uuid", &phantom.u_uuid)?;
        if phantom.data.is_empty() {
            return Err(DomainError::validation(
                "phantom must contain at least one frame",
            ));
        }
        if phantom.data.len() > limits.max_phantom_frames {
            return Err(DomainError::validation(format!(
                "phantom exceeds {} frames",
                limits.max_phantom_frames
            )));
        }
        for (index, frame) in phantom.data.iter().enumerate() {
            validate_vector_at("phantom.data", index, frame.pos())?;
            validate_vector_at("phantom.data", index, frame.rot())?;
        }

        Ok(NewTraceBundle {
            object: self.object,
            message: self.message,
            phantom,
        })
    }
}

fn validate_owner(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("`{field}` must not be empty")));
    }
    reject_nul(field, value)?;
    // The column stores the value as sent, padding included.
    if value.chars().count() > MAX_OWNER_LEN {
        return Err(DomainError::validation(format!(
            "`{field}` exceeds {MAX_OWNER_LEN} characters"
        )));
    }
    Ok(())
}

// Postgres text and jsonb cannot hold U+0000.
fn reject_nul(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.contains('\0') {
        return Err(DomainError::validation(format!(
            "`{field}` must not contain NUL characters"
        )));
    }
    Ok(())
}

fn validate_vector(field: &'static str, value: &str) -> Result<(), DomainError> {
    if is_vector3(value) {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "`{field}` must be three comma-separated numbers, got `{value}`"
        )))
    }
}

fn validate_vector_at(field: &'static str, index: usize, value: &str) -> Result<(), DomainError> {
    if is_vector3(value) {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "`{field}[{index}]` must hold three comma-separated numbers, got `{value}`"
        )))
    }
}

/// `true` when `value` is exactly three comma-separated finite numbers.
pub fn is_vector3(value: &str) -> bool {
    let mut count = 0;
    for component in value.split(',') {
        count += 1;
        match component.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => {}
            _ => return false,
        }
    }
    count == 3
}
