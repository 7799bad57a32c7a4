use authenex_lib::services::document_extractor::{extract_document, DocumentKind};
use authenex_lib::services::forensics::document::{average_paragraph_length, has_enough_text};
use authenex_lib::{has_flag, parse_arg_value};
use serde::Serialize;

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  cargo run --bin inspect_document -- <path.pdf|path.docx> [--type <pdf|docx>] [--lines <n>] [--full] [--out <json_path>]"
        );
        return Ok(());
    }

    let path = std::path::PathBuf::from(&args[1]);
    let kind = match parse_arg_value(&args, "--type").as_deref() {
        Some("pdf") => DocumentKind::Pdf,
        Some("docx") => DocumentKind::Docx,
        Some(other) => return Err(format!("unknown document type: {}", other)),
        None => DocumentKind::from_path(&path).map_err(|e| e.to_string())?,
    };
    let lines_n: usize = parse_arg_value(&args, "--lines")
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);
    let full = has_flag(&args, "--full");
    let out_path = parse_arg_value(&args, "--out");

    let doc = extract_document(&path, kind).map_err(|e| format!("extract failed: {}", e))?;

    println!("File: {}", path.display());
    println!("Type: {:?}", kind);
    println!("SHA-256: {}", doc.document_hash);
    println!("Extracted: {} chars ({} bytes)", doc.text.chars().count(), doc.text.len());
    println!("Text scorer eligible: {}", if has_enough_text(&doc) { "yes" } else { "no" });
    println!("Average paragraph length: {:.2}", average_paragraph_length(&doc.text));
    println!();

    if doc.metadata.is_empty() {
        println!("Metadata: (none)");
    } else {
        println!("Metadata:");
        for (key, value) in &doc.metadata {
            println!("  {} = {}", key, value);
        }
    }
    println!();

    let lines: Vec<&str> = doc.text.lines().filter(|l| !l.trim().is_empty()).collect();
    println!("Lines: {}", lines.len());
    for (i, line) in lines.iter().take(lines_n).enumerate() {
        if full {
            println!("[L{:04}] {}", i, line);
        } else {
            println!("[L{:04}] chars={}  {}", i, line.chars().count(), preview(line, 120));
        }
    }
    if lines.len() > lines_n {
        println!("... ({} more lines)", lines.len() - lines_n);
    }

    if let Some(out_path) = out_path {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Output<'a> {
            file: String,
            kind: DocumentKind,
            extracted_chars: usize,
            average_paragraph_length: f64,
            document: &'a authenex_lib::services::document_extractor::ExtractedDocument,
        }

        let out = Output {
            file: path.display().to_string(),
            kind,
            extracted_chars: doc.text.chars().count(),
            average_paragraph_length: average_paragraph_length(&doc.text),
            document: &doc,
        };

        let json = serde_json::to_string_pretty(&out).map_err(|e| e.to_string())?;
        std::fs::write(&out_path, json).map_err(|e| format!("write out failed: {}", e))?;
        println!();
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}
