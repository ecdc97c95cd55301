//! Typed access to headers, path parameters and query parameters.
//!
//! # Resolution
//! Scalar getters take the **first** value stored under the name and convert
//! it. List getters convert **every** value and fail as a whole on the first
//! bad one. A name with no values is `NotFound` for scalar getters and an
//! empty list for list getters.
//!
//! # Design Decisions
//! - Header names are case-insensitive (the `HeaderMap` normalizes them)
//! - Query parameter names are case-sensitive
//! - Form values: urlencoded body values (POST/PUT/PATCH) first, then URL query values
//! - Malformed form pairs are skipped; query getters then report `MalformedForm`
//! - Path parameters are not available in this layer and always fail

use std::collections::HashMap;

use axum::http::{header, Method};

use crate::http::error::{ExtractError, ParamSource};
use crate::http::request::Request;

/// Typed getters over a request, one per (source × type) pairing.
pub trait RequestExtractor: Send + Sync {
    // Headers
    fn get_int_header(&self, name: &str) -> Result<i64, ExtractError>;
    fn get_string_header(&self, name: &str) -> Result<String, ExtractError>;
    fn get_bool_header(&self, name: &str) -> Result<bool, ExtractError>;
    fn get_float_header(&self, name: &str) -> Result<f64, ExtractError>;

    // Path parameters
    fn get_int_path_param(&self, name: &str) -> Result<i64, ExtractError>;
    fn get_string_path_param(&self, name: &str) -> Result<String, ExtractError>;
    fn get_bool_path_param(&self, name: &str) -> Result<bool, ExtractError>;
    fn get_float_path_param(&self, name: &str) -> Result<f64, ExtractError>;

    // Query parameters
    fn get_int_query_param(&self, name: &str) -> Result<i64, ExtractError>;
    fn get_string_query_param(&self, name: &str) -> Result<String, ExtractError>;
    fn get_bool_query_param(&self, name: &str) -> Result<bool, ExtractError>;
    fn get_float_query_param(&self, name: &str) -> Result<f64, ExtractError>;

    // Query parameter lists
    fn get_int_query_params(&self, name: &str) -> Result<Vec<i64>, ExtractError>;
    fn get_string_query_params(&self, name: &str) -> Result<Vec<String>, ExtractError>;
    fn get_bool_query_params(&self, name: &str) -> Result<Vec<bool>, ExtractError>;
    fn get_float_query_params(&self, name: &str) -> Result<Vec<f64>, ExtractError>;
}

/// Conversion from a raw parameter string.
trait ParamValue: Sized {
    const TYPE_NAME: &'static str;
    fn parse_param(raw: &str) -> Option<Self>;
}

impl ParamValue for i64 {
    const TYPE_NAME: &'static str = "int";

    fn parse_param(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl ParamValue for f64 {
    const TYPE_NAME: &'static str = "float";

    fn parse_param(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl ParamValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn parse_param(raw: &str) -> Option<Self> {
        match raw {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
            _ => None,
        }
    }
}

impl ParamValue for String {
    const TYPE_NAME: &'static str = "string";

    fn parse_param(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

fn convert<T: ParamValue>(origin: ParamSource, name: &str, raw: &str) -> Result<T, ExtractError> {
    T::parse_param(raw).ok_or_else(|| ExtractError::Parse {
        origin,
        name: name.to_string(),
        value: raw.to_string(),
        expected: T::TYPE_NAME,
    })
}

fn first<T: ParamValue>(origin: ParamSource, name: &str, values: &[String]) -> Result<T, ExtractError> {
    match values.first() {
        Some(raw) => convert(origin, name, raw),
        None => Err(ExtractError::NotFound {
            origin,
            name: name.to_string(),
        }),
    }
}

fn all<T: ParamValue>(origin: ParamSource, name: &str, values: &[String]) -> Result<Vec<T>, ExtractError> {
    values.iter().map(|raw| convert(origin, name, raw)).collect()
}

fn unsupported<T>(name: &str) -> Result<T, ExtractError> {
    Err(ExtractError::Unsupported {
        origin: ParamSource::PathParam,
        name: name.to_string(),
    })
}

/// Form values in arrival order per name.
type FormValues = HashMap<String, Vec<String>>;

fn has_valid_escapes(segment: &[u8]) -> bool {
    let mut i = 0;
    while i < segment.len() {
        if segment[i] == b'%' {
            let valid = i + 2 < segment.len()
                && segment[i + 1].is_ascii_hexdigit()
                && segment[i + 2].is_ascii_hexdigit();
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Append `name=value` pairs from an urlencoded string.
///
/// Pairs containing `;` or a broken percent escape are skipped; the first
/// such problem is returned so getters can report it.
fn append_pairs(form: &mut FormValues, input: &[u8]) -> Option<ExtractError> {
    let mut first_error = None;

    for segment in input.split(|b| *b == b'&').filter(|s| !s.is_empty()) {
        let problem = if segment.contains(&b';') {
            Some("invalid semicolon separator in query".to_string())
        } else if !has_valid_escapes(segment) {
            Some(format!(
                "invalid percent escape in '{}'",
                String::from_utf8_lossy(segment)
            ))
        } else {
            None
        };

        match problem {
            Some(message) => {
                first_error.get_or_insert(ExtractError::MalformedForm(message));
            }
            None => {
                for (name, value) in url::form_urlencoded::parse(segment) {
                    form.entry(name.into_owned()).or_default().push(value.into_owned());
                }
            }
        }
    }

    first_error
}

fn is_urlencoded_form(request: &Request) -> bool {
    let body_method = matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH);
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    body_method && content_type.eq_ignore_ascii_case("application/x-www-form-urlencoded")
}

/// Extractor over one request. Borrows the request; never owns it.
#[derive(Debug)]
pub struct DefaultRequestExtractor<'a> {
    request: &'a Request,
    form: FormValues,
    /// First problem met while parsing the form; reported by query getters.
    form_error: Option<ExtractError>,
}

impl<'a> DefaultRequestExtractor<'a> {
    /// Parse the request's form values and build the extractor.
    ///
    /// Never fails: malformed pairs are dropped and the first problem is
    /// reported by the query getters only.
    pub fn new(request: &'a Request) -> Self {
        let mut form = FormValues::new();
        let mut form_error = None;

        if is_urlencoded_form(request) {
            form_error = append_pairs(&mut form, request.byte_body());
        }
        if let Some(query) = request.query() {
            let query_error = append_pairs(&mut form, query.as_bytes());
            form_error = form_error.or(query_error);
        }

        Self {
            request,
            form,
            form_error,
        }
    }

    /// The request this extractor reads from.
    pub fn request(&self) -> &'a Request {
        self.request
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        self.request
            .headers()
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect()
    }

    fn form_values(&self, name: &str) -> Result<&[String], ExtractError> {
        match &self.form_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.form.get(name).map(Vec::as_slice).unwrap_or_default()),
        }
    }
}

impl RequestExtractor for DefaultRequestExtractor<'_> {
    fn get_int_header(&self, name: &str) -> Result<i64, ExtractError> {
        first(ParamSource::Header, name, &self.header_values(name))
    }

    fn get_string_header(&self, name: &str) -> Result<String, ExtractError> {
        first(ParamSource::Header, name, &self.header_values(name))
    }

    fn get_bool_header(&self, name: &str) -> Result<bool, ExtractError> {
        first(ParamSource::Header, name, &self.header_values(name))
    }

    fn get_float_header(&self, name: &str) -> Result<f64, ExtractError> {
        first(ParamSource::Header, name, &self.header_values(name))
    }

    fn get_int_path_param(&self, name: &str) -> Result<i64, ExtractError> {
        unsupported(name)
    }

    fn get_string_path_param(&self, name: &str) -> Result<String, ExtractError> {
        unsupported(name)
    }

    fn get_bool_path_param(&self, name: &str) -> Result<bool, ExtractError> {
        unsupported(name)
    }

    fn get_float_path_param(&self, name: &str) -> Result<f64, ExtractError> {
        unsupported(name)
    }

    fn get_int_query_param(&self, name: &str) -> Result<i64, ExtractError> {
        first(ParamSource::QueryParam, name, self.form_values(name)?)
    }

    fn get_string_query_param(&self, name: &str) -> Result<String, ExtractError> {
        first(ParamSource::QueryParam, name, self.form_values(name)?)
    }

    fn get_bool_query_param(&self, name: &str) -> Result<bool, ExtractError> {
        first(ParamSource::QueryParam, name, self.form_values(name)?)
    }

    fn get_float_query_param(&self, name: &str) -> Result<f64, ExtractError> {
        first(ParamSource::QueryParam, name, self.form_values(name)?)
    }

    fn get_int_query_params(&self, name: &str) -> Result<Vec<i64>, ExtractError> {
        all(ParamSource::QueryParam, name, self.form_values(name)?)
    }

    fn get_string_query_params(&self, name: &str) -> Result<Vec<String>, ExtractError> {
        Ok(self.form_values(name)?.to_vec())
    }

    fn get_bool_query_params(&self, name: &str) -> Result<Vec<bool>, ExtractError> {
        all(ParamSource::QueryParam, name, self.form_values(name)?)
    }

    fn get_float_query_params(&self, name: &str) -> Result<Vec<f64>, ExtractError> {
        all(ParamSource::QueryParam, name, self.form_values(name)?)
    }
}
