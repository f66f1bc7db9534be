//! The shared language descriptor and its artifact.

use onescript_syntax::scanner::ONESCRIPT_SCANNER;
use onescript_syntax::{language, Language, LanguageError, Parser, LANGUAGE_VERSION};

#[test]
fn test_language_is_stable_across_threads() {
    let here = language() as *const Language as usize;
    let handles: Vec<_> = (0..4)
        .map(|_| std::thread::spawn(|| language() as *const Language as usize))
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), here);
    }
    assert_eq!(language().version(), LANGUAGE_VERSION);
}

#[test]
fn test_loaded_artifact_parses_like_the_shared_language() {
    let bytes = language().to_bytes().unwrap();
    let loaded: &'static Language =
        Box::leak(Box::new(Language::from_bytes(&bytes, &ONESCRIPT_SCANNER).unwrap()));

    let source = "Для Индекс = 1 По 3 Цикл Сообщить(Индекс); КонецЦикла;";
    let mut shared = Parser::new();
    shared.set_language(language()).unwrap();
    let mut reloaded = Parser::new();
    reloaded.set_language(loaded).unwrap();
    assert_eq!(
        shared.parse(source, None).unwrap().to_sexp(),
        reloaded.parse(source, None).unwrap().to_sexp()
    );
}

#[test]
fn test_corrupted_artifact_rejected() {
    let mut bytes = language().to_bytes().unwrap();
    bytes.truncate(bytes.len() / 2);
    assert!(matches!(
        Language::from_bytes(&bytes, &ONESCRIPT_SCANNER),
        Err(LanguageError::InvalidArtifact(_))
    ));
    assert!(Language::from_bytes(b"nope", &ONESCRIPT_SCANNER).is_err());
}

#[test]
fn test_node_kinds_and_fields_are_discoverable() {
    let language = language();
    for kind in ["source_file", "if_statement", "region", "method_call", "ERROR"] {
        assert!(language.symbol_for_name(kind, true).is_some(), "{}", kind);
    }
    for field in ["condition", "consequence", "alternative", "name", "body"] {
        assert!(language.field_id_for_name(field).is_some(), "{}", field);
    }
    assert!(language.symbol_for_name("КонецЕсли", false).is_none());
    assert!(language.symbol_for_name("EndIf", false).is_some());
}
