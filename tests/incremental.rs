//! Incremental reparse gives the same tree as parsing the new text from
//! scratch.

use onescript_syntax::{language, InputEdit, Parser, Tree};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const MODULE: &str = r#"Перем Кэш Экспорт;

#Область Служебные

Функция Сумма(А, Б = 0) Экспорт
    Возврат А + Б * 2;
КонецФункции

Процедура Обработать(Таблица)
    Для Каждого Строка Из Таблица Цикл
        Если Строка.Количество > 0 Тогда
            Кэш.Вставить(Строка.Ключ, Сумма(Строка.Количество, 1));
        Иначе
            Продолжить;
        КонецЕсли;
    КонецЦикла;
КонецПроцедуры

#КонецОбласти

// Тело модуля
Кэш = Новый Соответствие;
Обработать(Новый Массив);
"#;

fn parser() -> Parser {
    let mut parser = Parser::new();
    parser.set_language(language()).unwrap();
    parser
}

fn full_parse(text: &str) -> Tree {
    parser().parse(text, None).unwrap()
}

/// Parses `old`, records the edit to `new` and reparses incrementally.
fn reparse(old: &str, new: &str) -> (Tree, usize) {
    let mut parser = parser();
    let mut tree = parser.parse(old, None).unwrap();
    tree.edit(&InputEdit::between(old, new));
    let tree = parser.parse(new, Some(&tree)).unwrap();
    (tree, parser.last_stats().reused_nodes)
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[test]
fn test_edit_inside_function_reuses_the_rest() {
    let new = MODULE.replace("Б * 2", "Б * 3");
    let (tree, reused) = reparse(MODULE, &new);
    assert_eq!(tree.to_sexp(), full_parse(&new).to_sexp());
    assert!(!tree.root_node().has_error());
    assert!(reused > 0);
}

#[test]
fn test_edit_that_breaks_and_fixes_syntax() {
    let broken = MODULE.replace("КонецЕсли;", "");
    let (tree, _) = reparse(MODULE, &broken);
    assert_eq!(tree.to_sexp(), full_parse(&broken).to_sexp());
    assert!(tree.root_node().has_error());

    let (fixed, _) = reparse(&broken, MODULE);
    assert_eq!(fixed.to_sexp(), full_parse(MODULE).to_sexp());
    assert!(!fixed.root_node().has_error());
}

#[test]
fn test_edit_turning_identifier_into_keyword() {
    // "Кэш" -> "Если" changes the token kind at the start of a statement
    let new = MODULE.replacen("Кэш = Новый", "Если = Новый", 1);
    let (tree, _) = reparse(MODULE, &new);
    assert_eq!(tree.to_sexp(), full_parse(&new).to_sexp());
}

#[test]
fn test_multiple_edits_are_applied_in_order() {
    let step1 = MODULE.replace("Б = 0", "Б = 10");
    let step2 = step1.replace("Продолжить;", "Прервать;");

    let mut parser = parser();
    let mut tree = parser.parse(MODULE, None).unwrap();
    tree.edit(&InputEdit::between(MODULE, &step1));
    tree.edit(&InputEdit::between(&step1, &step2));
    let tree = parser.parse(&step2, Some(&tree)).unwrap();
    assert_eq!(tree.to_sexp(), full_parse(&step2).to_sexp());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_insertion_matches_full_parse(
        at in 0..MODULE.len(),
        snippet in prop::sample::select(vec![
            "", " ", "\n", ";", "А", "1", "Если", "КонецЕсли;", "(", ")", "\"",
            "// комментарий\n", "#Область Х\n", "#КонецОбласти\n", "Возврат;", ".",
        ]),
    ) {
        let at = floor_char_boundary(MODULE, at);
        let mut new = MODULE.to_string();
        new.insert_str(at, snippet);
        let (tree, _) = reparse(MODULE, &new);
        prop_assert_eq!(tree.to_sexp(), full_parse(&new).to_sexp());
    }

    #[test]
    fn prop_deletion_matches_full_parse(start in 0..MODULE.len(), len in 1usize..12) {
        let start = floor_char_boundary(MODULE, start);
        let end = floor_char_boundary(MODULE, start + len);
        let mut new = MODULE.to_string();
        new.replace_range(start..end, "");
        let (tree, _) = reparse(MODULE, &new);
        prop_assert_eq!(tree.to_sexp(), full_parse(&new).to_sexp());
    }
}
