// Summary statistics printed next to bars, lines and histograms

use crate::data::Responses;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    pub n: usize,
    /// `None` without any valid response
    pub mean: Option<f64>,
    /// Population standard deviation
    pub std: Option<f64>,
    pub n_no_answer: usize,
}

impl Summary {
    pub fn from_responses(responses: &Responses) -> Self {
        let n = responses.values.len();
        let (mean, std) = if n == 0 {
            (None, None)
        } else {
            let mean = responses.values.iter().sum::<f64>() / n as f64;
            let var = responses
                .values
                .iter()
                .map(|v| (v - mean).powi(2))
                .sum::<f64>()
                / n as f64;
            (Some(mean), Some(var.sqrt()))
        };
        Self {
            n,
            mean,
            std,
            n_no_answer: responses.n_no_answer,
        }
    }

    /// `n`, `m`, `s` and `E` lines; mean and std only with responses.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!("n = {}", self.n)];
        if let (Some(mean), Some(std)) = (self.mean, self.std) {
            lines.push(format!("m = {:.2}", mean));
            lines.push(format!("s = {:.2}", std));
        }
        lines.push(format!("E = {}", self.n_no_answer));
        lines
    }

    /// Short form used by histograms
    pub fn count_lines(&self) -> Vec<String> {
        vec![format!("n = {}", self.n), format!("E = {}", self.n_no_answer)]
    }
}
