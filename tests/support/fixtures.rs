use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Builds an in-memory zip archive from `(name, contents)` pairs.
#[must_use]
pub fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip member");
        writer.write_all(data.as_bytes()).expect("write zip member");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Renders a simple directory-listing page linking to `hrefs`.
#[must_use]
pub fn listing_html(hrefs: &[&str]) -> String {
    let rows: String = hrefs
        .iter()
        .map(|href| format!("<tr><td><a href=\"{href}\">{href}</a></td></tr>\n"))
        .collect();
    format!(
        "<html><head><title>Index</title></head><body>\n\
         <a href=\"../\">Parent directory</a>\n<table>\n{rows}</table></body></html>"
    )
}
