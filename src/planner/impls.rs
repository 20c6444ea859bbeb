// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 lacklustr@protonmail.com https://github.com/eadf
// This file is part of the kerf crate.

//! A module containing boiler-plate implementations of standard traits

use crate::{KerfError, planner::Options};
use std::collections::HashMap;

impl Options for HashMap<String, String> {
    /// Will return an option parsed as a `T` or an Err
    fn get_mandatory_parsed_option<T: std::str::FromStr>(
        &self,
        key: &str,
        default: Option<T>,
    ) -> Result<T, KerfError> {
        match self.get(key) {
            Some(v) => match v.parse() {
                Ok(val) => Ok(val),
                Err(_) => Err(KerfError::InvalidParameter(format!(
                    "Invalid value for parameter {{\"{}\"}}: {{\"{}\"}}",
                    key, v
                ))),
            },
            None => {
                if let Some(default_value) = default {
                    Ok(default_value)
                } else {
                    Err(KerfError::MissingParameter(format!(
                        "The mandatory parameter \"{key}\" was missing"
                    )))
                }
            }
        }
    }

    /// Will return an option parsed as a `T` or None.
    /// If the option is missing None is returned, if it is there but can't
    /// be parsed an error will be returned.
    fn get_parsed_option<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, KerfError> {
        match self.get(key) {
            Some(v) => match v.parse() {
                Ok(val) => Ok(Some(val)),
                Err(_) => Err(KerfError::InvalidParameter(format!(
                    "Invalid value for parameter {{\"{}\"}}: {{\"{}\"}}",
                    key, v
                ))),
            },
            None => Ok(None),
        }
    }

    /// Returns the &str value of an option, or an Err if it does not exist
    fn get_mandatory_option(&self, key: &str) -> Result<&str, KerfError> {
        match self.get(key) {
            Some(v) => Ok(v),
            None => Err(KerfError::MissingParameter(format!(
                "The parameter {{\"{key}\"}} was missing"
            ))),
        }
    }

    /// Checks if an option exists
    fn does_option_exist(&self, key: &str) -> Result<bool, KerfError> {
        Ok(self.get(key).is_some())
    }
}
