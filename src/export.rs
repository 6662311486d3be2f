//! Spreadsheet export of the displayed contacts.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;

use crate::model::Contact;

pub const HEADERS: [&str; 10] = [
    "Full Name",
    "Email",
    "Phone",
    "Organization",
    "Organization Type",
    "LinkedIn",
    "Instagram",
    "X",
    "Sector",
    "Country",
];

#[derive(Serialize)]
struct Row<'a> {
    #[serde(rename = "Full Name")]
    full_name: &'a str,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Phone")]
    phone: String,
    #[serde(rename = "Organization")]
    organization: &'a str,
    #[serde(rename = "Organization Type")]
    organization_type: &'a str,
    #[serde(rename = "LinkedIn")]
    linkedin: &'a str,
    #[serde(rename = "Instagram")]
    instagram: &'a str,
    #[serde(rename = "X")]
    x: &'a str,
    #[serde(rename = "Sector")]
    sector: &'a str,
    #[serde(rename = "Country")]
    country: &'a str,
}

impl<'a> From<&'a Contact> for Row<'a> {
    fn from(contact: &'a Contact) -> Self {
        Self {
            full_name: &contact.full_name,
            email: contact.email.joined(),
            phone: contact.phone.joined(),
            organization: &contact.organization,
            organization_type: &contact.organization_type,
            linkedin: &contact.linkedin,
            instagram: &contact.instagram,
            x: &contact.x,
            sector: &contact.sector,
            country: &contact.country,
        }
    }
}

/// `<directory>/<filename>.csv`; the extension is not doubled.
pub fn export_path(directory: &Path, filename: &str) -> PathBuf {
    if filename.to_ascii_lowercase().ends_with(".csv") {
        directory.join(filename)
    } else {
        directory.join(format!("{}.csv", filename))
    }
}

/// Write the header row, then one row per contact. The header is written
/// even when there are no contacts.
pub fn write_contacts<W: Write>(writer: W, contacts: &[&Contact]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(HEADERS).context("failed to write header")?;
    for contact in contacts {
        writer
            .serialize(Row::from(*contact))
            .with_context(|| format!("failed to write contact {}", contact.id))?;
    }
    writer.flush().context("failed to flush export")?;
    Ok(())
}

pub fn export_to_file(path: &Path, contacts: &[&Contact]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    write_contacts(file, contacts)
        .with_context(|| format!("failed to export contacts to {}", path.display()))?;
    tracing::info!(path = %path.display(), count = contacts.len(), "exported contacts");
    Ok(())
}
