use std::collections::HashMap;

use serde::Serialize;
use validator::Validate;

use crate::error::AppError;

/// Field-keyed validation failures, flattened from `validator`'s error tree.
#[derive(Debug, Serialize, Clone)]
pub struct ValidationReport {
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationReport {
    pub fn from_errors(errors: validator::ValidationErrors) -> Self {
        let mut error_map = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let error_messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();

            error_map.insert(field.to_string(), error_messages);
        }

        Self { errors: error_map }
    }

    /// One line per field, fields in stable order.
    pub fn message(&self) -> String {
        let mut fields: Vec<&String> = self.errors.keys().collect();
        fields.sort();

        fields
            .iter()
            .map(|field| format!("{}: {}", field, self.errors[*field].join(", ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub trait ValidateExt: Validate + Sized {
    /// Runs derive-based validation and folds failures into a single
    /// [`AppError::Validation`].
    fn validated(self) -> Result<Self, AppError> {
        match self.validate() {
            Ok(()) => Ok(self),
            Err(errors) => Err(AppError::Validation(
                ValidationReport::from_errors(errors).message(),
            )),
        }
    }
}

impl<T: Validate> ValidateExt for T {}
