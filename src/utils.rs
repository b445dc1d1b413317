// Utility functions
use chrono::{SecondsFormat, Utc};

/// Current UTC time in RFC 3339, as stored in user records.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn transliterate(c: char) -> Option<&'static str> {
    let latin = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        ' ' | '-' => "_",
        _ => return None,
    };
    Some(latin)
}

/// Преобразует название раздела в имя файла: транслитерация, пробелы в `_`.
pub fn section_file_name(section: &str) -> String {
    let mut name = String::new();
    for c in section.to_lowercase().chars() {
        match transliterate(c) {
            Some(latin) => name.push_str(latin),
            None if c.is_alphanumeric() => name.push(c),
            None => {}
        }
    }
    name.push_str(".json");
    name
}
