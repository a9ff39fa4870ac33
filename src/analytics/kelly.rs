/// Per-side bet economics on platform net odds.
///
/// Standard Kelly formula:
///   f* = (b·p − q) / b  =  (p·(b + 1) − 1) / b
/// where
///   b  = platform net odds (profit per unit staked, stake excluded)
///   p  = fair win probability taken from the reference feed
///   q  = 1 − p
///
/// The platform only lets us back a side, never lay it, so a negative
/// result is reported as a zero stake.

/// Kelly stake fraction of bankroll, in `[0, 1]`.
///
/// Returns `0.0` when `net_odds <= 0` or `win_prob <= 0`.
pub fn kelly_fraction(win_prob: f64, net_odds: f64) -> f64 {
    if net_odds <= 0.0 || win_prob <= 0.0 {
        return 0.0;
    }
    let f = (win_prob * (net_odds + 1.0) - 1.0) / net_odds;
    f.clamp(0.0, 1.0)
}

/// Expected profit per unit staked: `p·(b + 1) − 1`.
pub fn expected_profit(win_prob: f64, net_odds: f64) -> f64 {
    win_prob * (net_odds + 1.0) - 1.0
}

/// Variance of the single-bet payoff (`+b` on a win, `−1` on a loss) around
/// its expectation.
pub fn profit_variance(win_prob: f64, net_odds: f64) -> f64 {
    let ev = expected_profit(win_prob, net_odds);
    let win = net_odds - ev;
    let lose = -1.0 - ev;
    win_prob * win * win + (1.0 - win_prob) * lose * lose
}
