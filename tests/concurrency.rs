//! Many parsers share one language from many threads.

use onescript_syntax::{language, Parser};
use rayon::prelude::*;

fn module(index: usize) -> String {
    format!(
        "Функция Ф{index}(А)\n    Возврат А * {index};\nКонецФункции\n\nРезультат = Ф{index}({index});\n"
    )
}

#[test]
fn test_parallel_parsing_matches_sequential() {
    let sources: Vec<String> = (0..64).map(module).collect();

    let mut parser = Parser::new();
    parser.set_language(language()).unwrap();
    let sequential: Vec<String> = sources
        .iter()
        .map(|s| parser.parse(s, None).unwrap().to_sexp())
        .collect();

    let parallel: Vec<String> = sources
        .par_iter()
        .map_init(
            || {
                let mut parser = Parser::new();
                parser.set_language(language()).unwrap();
                parser
            },
            |parser, s| parser.parse(s, None).unwrap().to_sexp(),
        )
        .collect();

    assert_eq!(sequential, parallel);
    assert!(sequential.iter().all(|s| !s.contains("ERROR")));
}

#[test]
fn test_trees_move_between_threads() {
    let mut parser = Parser::new();
    parser.set_language(language()).unwrap();
    let source = module(1);
    let tree = parser.parse(&source, None).unwrap();
    let sexp = std::thread::spawn(move || tree.to_sexp()).join().unwrap();
    assert!(sexp.starts_with("(source_file (function_declaration"));
}
