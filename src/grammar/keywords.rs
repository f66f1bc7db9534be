//! Ключевые слова OneScript
//!
//! Каждое ключевое слово имеет каноническое (английское) имя терминала и
//! набор написаний. Сравнение регистронезависимое: `Если`, `если`, `ЕСЛИ`
//! и `If` дают один и тот же терминал.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::KeywordDef;

/// Пары (каноническое имя, русское написание)
pub const ONESCRIPT_KEYWORDS: &[(&str, &str)] = &[
    // Объявления
    ("Var", "Перем"),
    ("Val", "Знач"),
    ("Export", "Экспорт"),
    ("Procedure", "Процедура"),
    ("EndProcedure", "КонецПроцедуры"),
    ("Function", "Функция"),
    ("EndFunction", "КонецФункции"),
    // Управление потоком
    ("If", "Если"),
    ("Then", "Тогда"),
    ("ElsIf", "ИначеЕсли"),
    ("Else", "Иначе"),
    ("EndIf", "КонецЕсли"),
    ("While", "Пока"),
    ("For", "Для"),
    ("Each", "Каждого"),
    ("In", "Из"),
    ("To", "По"),
    ("Do", "Цикл"),
    ("EndDo", "КонецЦикла"),
    ("Try", "Попытка"),
    ("Except", "Исключение"),
    ("EndTry", "КонецПопытки"),
    ("Raise", "ВызватьИсключение"),
    ("Return", "Возврат"),
    ("Break", "Прервать"),
    ("Continue", "Продолжить"),
    ("AddHandler", "ДобавитьОбработчик"),
    ("RemoveHandler", "УдалитьОбработчик"),
    // Операторы
    ("New", "Новый"),
    ("And", "И"),
    ("Or", "Или"),
    ("Not", "Не"),
    // Литералы
    ("True", "Истина"),
    ("False", "Ложь"),
    ("Undefined", "Неопределено"),
    ("Null", "Null"),
];

/// Приводит написание к форме для сравнения
pub fn fold_case(word: &str) -> String {
    word.to_lowercase()
}

/// Definitions for the grammar: the English name is both the canonical
/// terminal name and one of the spellings.
pub fn onescript_keywords() -> Vec<KeywordDef> {
    ONESCRIPT_KEYWORDS
        .iter()
        .map(|(en, ru)| {
            let mut spellings = vec![en.to_string()];
            if fold_case(en) != fold_case(ru) {
                spellings.push(ru.to_string());
            }
            KeywordDef {
                name: en.to_string(),
                spellings,
            }
        })
        .collect()
}

static KEYWORD_LOOKUP: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (en, ru) in ONESCRIPT_KEYWORDS {
        map.insert(fold_case(en), *en);
        map.insert(fold_case(ru), *en);
    }
    map
});

/// Каноническое имя ключевого слова для любого его написания
pub fn canonical_keyword(word: &str) -> Option<&'static str> {
    KEYWORD_LOOKUP.get(&fold_case(word)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_bilingual_lookup() {
        assert_eq!(canonical_keyword("Если"), Some("If"));
        assert_eq!(canonical_keyword("ЕСЛИ"), Some("If"));
        assert_eq!(canonical_keyword("если"), Some("If"));
        assert_eq!(canonical_keyword("iF"), Some("If"));
        assert_eq!(canonical_keyword("КонецЕсли"), Some("EndIf"));
        assert_eq!(canonical_keyword("NULL"), Some("Null"));
        assert_eq!(canonical_keyword("МояПеременная"), None);
    }

    #[test]
    fn test_spellings_are_unique() {
        let defs = onescript_keywords();
        let mut seen = std::collections::HashSet::new();
        for def in &defs {
            for spelling in &def.spellings {
                assert!(seen.insert(fold_case(spelling)), "duplicate {}", spelling);
            }
        }
        let null = defs.iter().find(|d| d.name == "Null").unwrap();
        assert_eq!(null.spellings.len(), 1);
    }
}
