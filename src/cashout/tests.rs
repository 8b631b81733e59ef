//! Unit tests for cash-out and void handling

#[cfg(test)]
mod tests {
    use super::super::*;
    use rust_decimal_macros::dec;

    const BET: &str = "DH dh Lakers ML -110 $2.00 Returns $3.80";

    fn resolver() -> CashoutResolver {
        CashoutResolver::new(["✅", "❌", "🚫", "💰"])
    }

    #[test]
    fn test_gain_framing() {
        let framing = Framing::between(dec!(3.00), Some(dec!(2.00)));
        assert_eq!(framing, Framing::Gain(dec!(1.00)));
        assert_eq!(framing.gain_loss(), Some(dec!(1.00)));
    }

    #[test]
    fn test_loss_framing() {
        let framing = Framing::between(dec!(1.50), Some(dec!(2.00)));
        assert_eq!(framing, Framing::Loss(dec!(0.50)));
        assert_eq!(framing.gain_loss(), Some(dec!(-0.50)));
    }

    #[test]
    fn test_neutral_framing_inside_band() {
        assert_eq!(Framing::between(dec!(1.999), Some(dec!(2.00))), Framing::Neutral);
        assert_eq!(Framing::between(dec!(2.004), Some(dec!(2.00))), Framing::Neutral);
        assert_eq!(
            Framing::between(dec!(2.005), Some(dec!(2.00))),
            Framing::Gain(dec!(0.005))
        );
    }

    #[test]
    fn test_plain_framing_without_stake() {
        let framing = Framing::between(dec!(3.00), None);
        assert_eq!(framing, Framing::Plain);
        assert_eq!(framing.gain_loss(), None);
    }

    #[test]
    fn test_decide_cashout_with_gain() {
        let decision = resolver().decide("$3", BET, &[]);
        assert_eq!(
            decision,
            CashoutDecision::CashOut {
                amount: dec!(3),
                stake: Some(dec!(2.00)),
                framing: Framing::Gain(dec!(1.00)),
            }
        );
        assert_eq!(
            decision.status_line().unwrap(),
            "💰 **Cashed Out** for $3.00 (gain of $1.00)"
        );
        assert_eq!(decision.event_kind(), Some("cashout"));
    }

    #[test]
    fn test_decide_neutral_has_no_gain_phrase() {
        let decision = resolver().decide("$1.999", BET, &[]);
        let line = decision.status_line().unwrap();
        assert!(!line.contains("gain"));
        assert!(!line.contains("loss"));
        assert_eq!(decision.report_amounts(), (dec!(1.999), Some(dec!(0))));
    }

    #[test]
    fn test_decide_plain_when_no_stake() {
        let decision = resolver().decide("$5", "Lakers ML gb, good luck", &[]);
        assert_eq!(
            decision.status_line().unwrap(),
            "💰 **Cashed Out** for $5.00"
        );
        assert_eq!(decision.report_amounts(), (dec!(5), None));
    }

    #[test]
    fn test_decide_void_on_zero() {
        let decision = resolver().decide(" $0.00 ", BET, &[]);
        assert_eq!(decision, CashoutDecision::Void);
        assert_eq!(decision.event_kind(), Some("void"));
        assert_eq!(decision.report_amounts(), (dec!(0), Some(dec!(0))));
    }

    #[test]
    fn test_decide_skips_non_amount() {
        assert_eq!(
            resolver().decide("cashed at $3", BET, &[]),
            CashoutDecision::Skip(SkipReason::NotAnAmount)
        );
    }

    #[test]
    fn test_decide_skips_resolved_bet() {
        for marker in ["✅", "❌", "🚫", "💰"] {
            let decision = resolver().decide("$3", BET, &[marker.to_string()]);
            assert_eq!(decision, CashoutDecision::Skip(SkipReason::AlreadyResolved));
            assert!(decision.status_line().is_none());
        }
        assert!(!resolver().is_resolved(&["👍".to_string()]));
    }

    #[test]
    fn test_summary_quotes_original() {
        let original = OriginalBet {
            author: "danny",
            content: "line one\nline two",
            channel: "bets",
        };
        let text = CashoutDecision::Void.summary(&original).unwrap();
        assert_eq!(
            text,
            "🚫 **Bet Voided**\n> **Original bet by danny** in #bets\n> line one\n> line two"
        );
    }
}
