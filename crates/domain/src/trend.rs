use pulse_core::config::TrendConfig;
use pulse_core::models::{TrendDirection, TrendResult};

use crate::{mean, round2};

/// 趋势分析
///
/// 比较最近 `window` 个点的均值与再往前 `window` 个点的均值：
/// 差值大于 `sensitivity` 为上升，小于 `-sensitivity` 为下降，否则平稳。
/// 任一窗口凑不满 `window` 个点时返回 `InsufficientData`。
///
/// `scores` 按时间正序排列，最新的在最后。
pub fn analyze_trend(scores: &[f64], config: &TrendConfig) -> TrendResult {
    let window = config.window;
    if window == 0 || scores.len() < window * 2 {
        return TrendResult::insufficient_data();
    }

    let recent = &scores[scores.len() - window..];
    let previous = &scores[scores.len() - window * 2..scores.len() - window];

    let recent_average = mean(recent);
    let previous_average = mean(previous);
    let change = recent_average - previous_average;

    let direction = if change > config.sensitivity {
        TrendDirection::Improving
    } else if change < -config.sensitivity {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    TrendResult {
        direction,
        change: round2(change),
        recent_average: round2(recent_average),
        previous_average: round2(previous_average),
    }
}
