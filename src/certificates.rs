//! Certificate template filling and zip bundling
//!
//! Issuance fills a per-type text template with the request's fields. The
//! rendering boundary is deliberately small: whatever produces the final
//! printable document consumes the filled text, so swapping the output
//! format never touches the fill logic.

use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::db::requests::{CertificateType, RequestRow};
use crate::error::PortalError;

/// Built-in template used when no override file exists
const DEFAULT_TEMPLATE: &str = r#"Republic of the Philippines
Office of the Barangay Chairman

{{certificate_title}}

TO WHOM IT MAY CONCERN:

This is to certify that {{first_name}} {{middle_name}}{{last_name}},
a resident of {{address}}, is known to this office to be of good
standing in the community.

This certification is issued upon the request of the above-named
person for {{purpose}} purposes.

Issued on {{date}}.


________________________
Barangay Chairman
"#;

/// Loads certificate templates, preferring per-type override files
pub struct TemplateStore {
    dir: Option<PathBuf>,
}

impl TemplateStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Template text for a certificate type.
    ///
    /// Looks for `<dir>/<type>.txt`; missing files fall back to the
    /// built-in template.
    pub fn template_for(&self, kind: CertificateType) -> Result<String, PortalError> {
        if let Some(ref dir) = self.dir {
            let path = dir.join(format!("{}.txt", kind.as_str()));
            match std::fs::read_to_string(&path) {
                Ok(text) => return Ok(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(DEFAULT_TEMPLATE.to_string())
    }
}

/// Fill a template with a request's fields
pub fn fill_template(template: &str, request: &RequestRow, issued_on: &str) -> String {
    let middle = match &request.middle_name {
        Some(m) if !m.is_empty() => format!("{} ", m),
        _ => String::new(),
    };

    template
        .replace("{{certificate_title}}", request.certificate_type.display_name())
        .replace("{{certificate_type}}", request.certificate_type.as_str())
        .replace("{{last_name}}", &request.last_name)
        .replace("{{first_name}}", &request.first_name)
        .replace("{{middle_name}}", &middle)
        .replace("{{address}}", &request.address)
        .replace("{{purpose}}", &request.purpose)
        .replace("{{date}}", issued_on)
}

/// Render the certificate for a request
pub fn render_certificate(
    templates: &TemplateStore,
    request: &RequestRow,
) -> Result<String, PortalError> {
    let template = templates.template_for(request.certificate_type)?;
    let issued_on = Utc::now().format("%Y-%m-%d").to_string();
    Ok(fill_template(&template, request, &issued_on))
}

/// File name for a certificate inside a bundle
pub fn certificate_file_name(request: &RequestRow) -> String {
    format!(
        "{}-{}-{}.txt",
        request.id,
        request.certificate_type.as_str(),
        request.last_name.to_lowercase().replace(' ', "_")
    )
}

/// Bundle rendered certificates into a deflate zip archive
pub fn bundle(certificates: &[(String, String)]) -> Result<Vec<u8>, PortalError> {
    if certificates.is_empty() {
        return Err(PortalError::Validation(
            "no certificates to bundle".to_string(),
        ));
    }

    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, body) in certificates {
        writer
            .start_file(name.clone(), options)
            .map_err(|e| PortalError::Internal(format!("Zip entry failed: {}", e)))?;
        writer.write_all(body.as_bytes())?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| PortalError::Internal(format!("Zip finish failed: {}", e)))?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::requests::RequestStatus;

    fn sample_request() -> RequestRow {
        RequestRow {
            id: 42,
            last_name: "Cruz".to_string(),
            first_name: "Ana".to_string(),
            middle_name: Some("Santos".to_string()),
            address: "Purok 2, Mabini St.".to_string(),
            contact_number: "09171234567".to_string(),
            email: None,
            certificate_type: CertificateType::Clearance,
            purpose: "employment".to_string(),
            status: RequestStatus::Approved,
            created_at: "2026-08-01 09:00:00".to_string(),
        }
    }

    #[test]
    fn test_fill_template_substitutes_fields() {
        let filled = fill_template(DEFAULT_TEMPLATE, &sample_request(), "2026-08-06");

        assert!(filled.contains("Barangay Clearance"));
        assert!(filled.contains("Ana Santos Cruz"));
        assert!(filled.contains("employment"));
        assert!(filled.contains("2026-08-06"));
        assert!(!filled.contains("{{"));
    }

    #[test]
    fn test_missing_middle_name_collapses() {
        let mut request = sample_request();
        request.middle_name = None;

        let filled = fill_template(DEFAULT_TEMPLATE, &request, "2026-08-06");
        assert!(filled.contains("Ana Cruz"));
    }

    #[test]
    fn test_bundle_rejects_empty() {
        assert!(bundle(&[]).is_err());
    }

    #[test]
    fn test_bundle_produces_zip() {
        let request = sample_request();
        let body = fill_template(DEFAULT_TEMPLATE, &request, "2026-08-06");
        let bytes = bundle(&[(certificate_file_name(&request), body)]).unwrap();

        // zip local file header magic
        assert_eq!(&bytes[0..4], b"PK\x03\x04");
    }

    #[test]
    fn test_template_store_falls_back_to_builtin() {
        let store = TemplateStore::new(None);
        let template = store.template_for(CertificateType::Indigency).unwrap();
        assert!(template.contains("{{certificate_title}}"));
    }
}
