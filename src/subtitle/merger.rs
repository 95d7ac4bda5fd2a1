//! Склейка коротких фрагментов субтитров в юниты речи
//!
//! Соседние фрагменты склеиваются, если зазор между ними меньше порога и
//! итоговый юнит не длиннее ограничения. Это уменьшает число вызовов синтеза и
//! убирает неестественно короткие клипы ценой потери точности меток.

use crate::config::MergeConfig;
use crate::models::{CaptionFragment, SpeechUnit};

/// Минимальная длительность фрагмента с вырожденными метками, секунды
const MIN_FRAGMENT_SPAN: f64 = 0.01;

/// Склеить упорядоченные фрагменты в юниты
pub fn merge_fragments(fragments: &[CaptionFragment], config: &MergeConfig) -> Vec<SpeechUnit> {
    let mut units: Vec<SpeechUnit> = Vec::new();

    for fragment in fragments {
        let text = normalize_whitespace(&fragment.text);
        if text.is_empty() {
            continue;
        }

        let start = fragment.start.max(0.0);
        let end = if fragment.end > start {
            fragment.end
        } else {
            start + MIN_FRAGMENT_SPAN
        };

        if let Some(current) = units.last_mut() {
            let gap = start - current.end;
            let merged_end = current.end.max(end);
            let span = merged_end - current.start;

            // Одинаковый start склеиваем всегда: иначе порядок юнитов не строгий
            if start <= current.start || (gap < config.gap_threshold && span < config.max_unit_span) {
                current.text.push(' ');
                current.text.push_str(&text);
                current.end = merged_end;
                continue;
            }

            // Перекрытие без склейки: предыдущий юнит заканчивается там, где начинается новый
            if start < current.end {
                current.end = start;
            }
        }

        units.push(SpeechUnit::new(start, end, text));
    }

    log::info!(
        "Merged {} caption fragments into {} speech units",
        fragments.len(),
        units.len()
    );
    units
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(start: f64, end: f64, text: &str) -> CaptionFragment {
        CaptionFragment::new(start, end, text)
    }

    #[test]
    fn test_close_fragments_are_merged() {
        let fragments = vec![
            frag(0.0, 1.0, "Hello"),
            frag(1.1, 2.0, "there"),
            frag(3.0, 4.0, "General"),
            frag(4.2, 5.0, "Kenobi"),
        ];
        let units = merge_fragments(&fragments, &MergeConfig::default());

        assert_eq!(units.len(), 2);
        assert_eq!(units[0], SpeechUnit::new(0.0, 2.0, "Hello there"));
        assert_eq!(units[1], SpeechUnit::new(3.0, 5.0, "General Kenobi"));
    }

    #[test]
    fn test_blank_fragments_dropped() {
        let fragments = vec![
            frag(0.0, 1.0, "   "),
            frag(1.0, 2.0, "\n"),
            frag(5.0, 6.0, "  spoken\n text "),
        ];
        let units = merge_fragments(&fragments, &MergeConfig::default());
        assert_eq!(units, vec![SpeechUnit::new(5.0, 6.0, "spoken text")]);
    }

    #[test]
    fn test_span_cap_starts_new_unit() {
        let fragments: Vec<CaptionFragment> = (0..8)
            .map(|i| frag(i as f64 * 2.0, i as f64 * 2.0 + 1.9, &format!("w{}", i)))
            .collect();
        let config = MergeConfig::default();
        let units = merge_fragments(&fragments, &config);

        assert!(units.len() > 1);
        for unit in &units {
            assert!(unit.window() < config.max_unit_span);
        }
    }

    #[test]
    fn test_single_long_fragment_kept_whole() {
        let fragments = vec![frag(0.0, 14.0, "a very long line"), frag(14.1, 15.0, "tail")];
        let units = merge_fragments(&fragments, &MergeConfig::default());

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].window(), 14.0);
        assert_eq!(units[1].text, "tail");
    }

    #[test]
    fn test_units_ordered_non_overlapping_and_text_preserved() {
        let fragments = vec![
            frag(0.0, 0.4, "a"),
            frag(0.2, 0.5, "b"),
            frag(0.5, 9.8, "c"),
            frag(9.0, 12.0, "d"),
            frag(12.0, 12.0, "e"),
            frag(20.0, 21.0, "f"),
        ];
        let units = merge_fragments(&fragments, &MergeConfig::default());

        for pair in units.windows(2) {
            assert!(pair[0].start < pair[1].start);
            assert!(pair[0].end <= pair[1].start);
        }
        for unit in &units {
            assert!(unit.start < unit.end);
        }

        let joined: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        assert_eq!(joined.join(" "), "a b c d e f");
    }

    #[test]
    fn test_same_start_always_merged() {
        let config = MergeConfig {
            gap_threshold: 0.3,
            max_unit_span: 2.0,
        };
        let fragments = vec![frag(1.0, 4.0, "first"), frag(1.0, 2.0, "dup")];
        let units = merge_fragments(&fragments, &config);
        assert_eq!(units, vec![SpeechUnit::new(1.0, 4.0, "first dup")]);
    }
}
