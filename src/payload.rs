use std::path::Path;

use reqwest::multipart::{Form, Part};

use crate::{geolocation::GeolocationSample, utils::mime_for_path};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    File {
        bytes: Vec<u8>,
        filename: String,
        content_type: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// Fields gathered from an upload form, in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: Vec<Field>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// A form holding a single file read from disk.
    pub async fn from_file(field_name: &str, path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".into());
        let mut form = Self::new();
        form.append_file(field_name, bytes, filename, mime_for_path(path));
        Ok(form)
    }

    pub fn append_text(&mut self, name: &str, value: impl Into<String>) {
        self.fields.push(Field {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        });
    }

    pub fn append_file(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
        filename: impl Into<String>,
        content_type: &str,
    ) {
        self.fields.push(Field {
            name: name.into(),
            value: FieldValue::File {
                bytes,
                filename: filename.into(),
                content_type: content_type.into(),
            },
        });
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// Multipart body for one `/upload` call. Built fresh for every submission.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    fields: Vec<Field>,
}

impl UploadRequest {
    pub fn from_form(form: FormData) -> Self {
        Self {
            fields: form.fields,
        }
    }

    pub fn image(name: &str, bytes: Vec<u8>, filename: &str, content_type: &str) -> Self {
        let mut form = FormData::new();
        form.append_file(name, bytes, filename, content_type);
        Self::from_form(form)
    }

    pub fn attach_location(&mut self, sample: &GeolocationSample) {
        for (name, value) in [("latitude", sample.latitude), ("longitude", sample.longitude)] {
            self.fields.push(Field {
                name: name.into(),
                value: FieldValue::Text(value.to_string()),
            });
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|field| match &field.value {
            FieldValue::Text(value) if field.name == name => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn file_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|field| matches!(field.value, FieldValue::File { .. }))
            .count()
    }

    /// Bytes carried by all fields, checked against the upload limit.
    pub fn payload_size(&self) -> usize {
        self.fields
            .iter()
            .map(|field| match &field.value {
                FieldValue::File { bytes, .. } => bytes.len(),
                FieldValue::Text(text) => text.len(),
            })
            .sum()
    }

    pub fn into_multipart(self) -> Result<Form, reqwest::Error> {
        let mut form = Form::new();
        for field in self.fields {
            form = match field.value {
                FieldValue::Text(text) => form.text(field.name, text),
                FieldValue::File {
                    bytes,
                    filename,
                    content_type,
                } => form.part(
                    field.name,
                    Part::bytes(bytes)
                        .file_name(filename)
                        .mime_str(&content_type)?,
                ),
            };
        }
        Ok(form)
    }
}
