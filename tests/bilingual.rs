//! Russian and English spellings produce the same trees.

use onescript_syntax::{language, Parser, Tree};
use pretty_assertions::assert_eq;

fn parse(source: &str) -> Tree {
    let mut parser = Parser::new();
    parser.set_language(language()).unwrap();
    parser.parse(source, None).unwrap()
}

fn assert_same_tree(russian: &str, english: &str) {
    let ru = parse(russian);
    let en = parse(english);
    assert!(!ru.root_node().has_error(), "{}", ru.to_sexp());
    assert_eq!(ru.to_sexp(), en.to_sexp());
}

#[test]
fn test_if_statement_in_both_languages() {
    let russian = "Если А > 0 Тогда\n    Б = 1;\nИначеЕсли А < 0 Тогда\n    Б = -1;\nИначе\n    Б = 0;\nКонецЕсли;";
    let english = "If А > 0 Then\n    Б = 1;\nElsIf А < 0 Then\n    Б = -1;\nElse\n    Б = 0;\nEndIf;";
    assert_same_tree(russian, english);

    let tree = parse(russian);
    let statement = tree.root_node().named_child(0).unwrap();
    assert_eq!(statement.kind(), "if_statement");
    assert_eq!(
        statement.child_by_field_name("condition").unwrap().kind(),
        "binary_expression"
    );
    assert_eq!(
        statement.child_by_field_name("consequence").unwrap().kind(),
        "block"
    );
    assert_eq!(
        statement.child_by_field_name("alternative").unwrap().kind(),
        "else_clause"
    );
}

#[test]
fn test_keywords_ignore_case() {
    assert_same_tree(
        "ЕСЛИ А ТОГДА Б(); конецесли;",
        "if А then Б(); ENDIF;",
    );
}

#[test]
fn test_methods_and_loops() {
    let russian = r#"
&НаСервере
Процедура Заполнить(Знач Таблица, Режим = Неопределено) Экспорт
    Перем Счетчик;
    Для Каждого Строка Из Таблица Цикл
        Если Строка.Пропустить Тогда
            Продолжить;
        КонецЕсли;
        Счетчик = Счетчик + 1;
    КонецЦикла;
    Для Индекс = 1 По 10 Цикл
        Прервать;
    КонецЦикла;
    Пока Истина Цикл
        Попытка
            ВызватьИсключение "ошибка";
        Исключение
            Возврат;
        КонецПопытки;
    КонецЦикла;
КонецПроцедуры

Функция Сумма(А, Б)
    Возврат Новый Структура("Сумма", ?(А = Null, 0, А) + Б);
КонецФункции
"#;
    let english = r#"
&НаСервере
Procedure Заполнить(Val Таблица, Режим = Undefined) Export
    Var Счетчик;
    For Each Строка In Таблица Do
        If Строка.Пропустить Then
            Continue;
        EndIf;
        Счетчик = Счетчик + 1;
    EndDo;
    For Индекс = 1 To 10 Do
        Break;
    EndDo;
    While True Do
        Try
            Raise "ошибка";
        Except
            Return;
        EndTry;
    EndDo;
EndProcedure

Function Сумма(А, Б)
    Return New Структура("Сумма", ?(А = Null, 0, А) + Б);
EndFunction
"#;
    assert_same_tree(russian, english);

    let tree = parse(russian);
    let kinds: Vec<&str> = tree
        .root_node()
        .named_children()
        .iter()
        .map(|n| n.kind())
        .collect();
    assert_eq!(kinds, vec!["procedure_declaration", "function_declaration"]);

    let procedure = tree.root_node().named_child(0).unwrap();
    assert_eq!(procedure.child_by_field_name("export").unwrap().kind(), "export");
    assert_eq!(
        procedure.child_by_field_name("name").unwrap().utf8_text(russian),
        "Заполнить"
    );
    assert_eq!(procedure.named_child(0).unwrap().kind(), "annotation");
}

#[test]
fn test_handlers_in_both_languages() {
    assert_same_tree(
        "ДобавитьОбработчик Объект.Событие, Обработчик;\nУдалитьОбработчик Объект.Событие, Обработчик;",
        "AddHandler Объект.Событие, Обработчик;\nRemoveHandler Объект.Событие, Обработчик;",
    );
}
