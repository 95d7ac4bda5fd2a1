//! Сопоставление перевода с исходными юнитами
//!
//! Перевод адресуется явным индексом: модель может переставлять, пропускать и
//! дублировать строки. Побеждает первое вхождение индекса, индексы вне
//! диапазона отбрасываются, юниты без перевода выпадают.

use crate::error::DubSyncError;
use crate::models::{IndexedTranslation, SpeechUnit};

/// Результат сопоставления перевода
#[derive(Debug, Clone)]
pub struct TranslationMapping {
    /// Переведенные юниты, упорядоченные по start
    pub units: Vec<SpeechUnit>,
    /// Сколько юнитов было на входе
    pub expected: usize,
    /// Отброшенные дубликаты
    pub duplicates: usize,
    /// Отброшенные индексы вне диапазона
    pub out_of_range: usize,
}

impl TranslationMapping {
    pub fn mapped(&self) -> usize {
        self.units.len()
    }

    /// Проверить полноту перевода
    ///
    /// Возвращает `IncompleteTranslation`, если доля сопоставленных юнитов ниже
    /// `min_coverage`. Ошибка не фатальна: вызывающая сторона решает, продолжать
    /// ли с меньшим числом юнитов.
    pub fn check_coverage(&self, min_coverage: f64) -> Result<(), DubSyncError> {
        if self.expected == 0 {
            return Ok(());
        }
        let coverage = self.mapped() as f64 / self.expected as f64;
        if coverage < min_coverage {
            return Err(DubSyncError::IncompleteTranslation {
                mapped: self.mapped(),
                expected: self.expected,
            });
        }
        Ok(())
    }
}

/// Сопоставить переводы с юнитами по индексу
pub fn map_translations(
    units: &[SpeechUnit],
    translations: &[IndexedTranslation],
) -> TranslationMapping {
    let mut slots: Vec<Option<String>> = vec![None; units.len()];
    let mut duplicates = 0;
    let mut out_of_range = 0;

    for translation in translations {
        let Some(slot) = slots.get_mut(translation.index) else {
            log::debug!(
                "Discarding translation for out-of-range index {} (have {} units)",
                translation.index,
                units.len()
            );
            out_of_range += 1;
            continue;
        };

        let text = translation.text.trim();
        if text.is_empty() {
            continue;
        }

        if slot.is_some() {
            log::debug!("Discarding duplicate translation for index {}", translation.index);
            duplicates += 1;
            continue;
        }

        *slot = Some(text.to_string());
    }

    let mut mapped: Vec<SpeechUnit> = units
        .iter()
        .zip(slots)
        .filter_map(|(unit, text)| text.map(|text| SpeechUnit::new(unit.start, unit.end, text)))
        .collect();

    mapped.sort_by(|a, b| a.start.total_cmp(&b.start));

    if mapped.len() < units.len() {
        log::warn!(
            "Translation covers {} of {} units, untranslated units are dropped",
            mapped.len(),
            units.len()
        );
    }

    TranslationMapping {
        units: mapped,
        expected: units.len(),
        duplicates,
        out_of_range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> Vec<SpeechUnit> {
        vec![
            SpeechUnit::new(0.0, 1.0, "zero"),
            SpeechUnit::new(1.0, 2.0, "one"),
            SpeechUnit::new(2.0, 3.0, "two"),
        ]
    }

    #[test]
    fn test_duplicates_and_omissions() {
        let translations = vec![
            IndexedTranslation::new(2, "dos"),
            IndexedTranslation::new(0, "cero"),
            IndexedTranslation::new(2, "dos otra vez"),
        ];
        let mapping = map_translations(&units(), &translations);

        assert_eq!(mapping.units.len(), 2);
        assert_eq!(mapping.units[0], SpeechUnit::new(0.0, 1.0, "cero"));
        assert_eq!(mapping.units[1], SpeechUnit::new(2.0, 3.0, "dos"));
        assert_eq!(mapping.duplicates, 1);
    }

    #[test]
    fn test_out_of_range_ignored() {
        let translations = vec![
            IndexedTranslation::new(7, "siete"),
            IndexedTranslation::new(1, "uno"),
        ];
        let mapping = map_translations(&units(), &translations);

        assert_eq!(mapping.units, vec![SpeechUnit::new(1.0, 2.0, "uno")]);
        assert_eq!(mapping.out_of_range, 1);
    }

    #[test]
    fn test_blank_translation_does_not_consume_index() {
        let translations = vec![
            IndexedTranslation::new(0, "  "),
            IndexedTranslation::new(0, "cero"),
        ];
        let mapping = map_translations(&units(), &translations);
        assert_eq!(mapping.units[0].text, "cero");
        assert_eq!(mapping.duplicates, 0);
    }

    #[test]
    fn test_coverage_check() {
        let translations = vec![IndexedTranslation::new(0, "cero")];
        let mapping = map_translations(&units(), &translations);

        assert!(matches!(
            mapping.check_coverage(0.9),
            Err(DubSyncError::IncompleteTranslation { mapped: 1, expected: 3 })
        ));
        assert!(mapping.check_coverage(0.3).is_ok());
    }

    #[test]
    fn test_output_sorted_by_start() {
        let reversed = vec![
            SpeechUnit::new(5.0, 6.0, "late"),
            SpeechUnit::new(1.0, 2.0, "early"),
        ];
        let translations = vec![
            IndexedTranslation::new(0, "tarde"),
            IndexedTranslation::new(1, "temprano"),
        ];
        let mapping = map_translations(&reversed, &translations);
        assert_eq!(mapping.units[0].text, "temprano");
        assert_eq!(mapping.units[1].text, "tarde");
    }
}
