//! File system utility helpers (BOM-aware readers, etc.)
use std::path::Path;

/// Расширения файлов с исходным кодом OneScript
pub const SOURCE_EXTENSIONS: &[&str] = &["os", "bsl"];

/// Reads a OneScript file with proper encoding detection and BOM handling.
/// Returns the content as UTF-8 string with BOM removed.
pub fn read_source_file<P: AsRef<Path>>(path: P) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(decode_source(&bytes))
}

/// Decodes raw source bytes: UTF-16 by BOM, then UTF-8, then Windows-1251.
pub fn decode_source(bytes: &[u8]) -> String {
    let content = match bytes {
        // UTF-16LE BOM: FF FE
        [0xFF, 0xFE, ..] => {
            let (decoded, _, had_errors) = encoding_rs::UTF_16LE.decode(bytes);
            if had_errors {
                tracing::warn!("Errors detected while decoding UTF-16LE file");
            }
            decoded.into_owned()
        }
        // UTF-16BE BOM: FE FF
        [0xFE, 0xFF, ..] => {
            let (decoded, _, had_errors) = encoding_rs::UTF_16BE.decode(bytes);
            if had_errors {
                tracing::warn!("Errors detected while decoding UTF-16BE file");
            }
            decoded.into_owned()
        }
        _ => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => {
                // Fall back to Windows-1251 (common in Russian 1C installations)
                tracing::debug!("UTF-8 decoding failed, trying Windows-1251");
                let (decoded, _, had_errors) = encoding_rs::WINDOWS_1251.decode(bytes);
                if had_errors {
                    tracing::warn!("Errors detected while decoding Windows-1251 file");
                }
                decoded.into_owned()
            }
        },
    };

    strip_bom(&content).to_string()
}

/// Removes BOM (Byte Order Mark) from the beginning of text if present
pub fn strip_bom(input: &str) -> &str {
    input.strip_prefix('\u{FEFF}').unwrap_or(input)
}

/// Является ли путь файлом исходного кода с одним из расширений
pub fn has_source_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bom() {
        let input_with_bom = "\u{FEFF}Процедура Тест()";
        assert_eq!(strip_bom(input_with_bom), "Процедура Тест()");
        assert_eq!(strip_bom("Процедура Тест()"), "Процедура Тест()");
        assert_eq!(strip_bom(""), "");
    }

    #[test]
    fn test_windows_1251_fallback() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("Перем А;");
        assert_eq!(decode_source(&bytes), "Перем А;");
    }

    #[test]
    fn test_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Если".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_source(&bytes), "Если");
    }

    #[test]
    fn test_extension_filter() {
        let exts = vec!["os".to_string(), "bsl".to_string()];
        assert!(has_source_extension(Path::new("a/Модуль.OS"), &exts));
        assert!(!has_source_extension(Path::new("a/readme.md"), &exts));
    }
}
