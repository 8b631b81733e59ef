//! Unit tests for reporting

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::error::BotError;
    use crate::parser::BetParser;
    use crate::types::{ChannelId, ChatMessage, ChatUser, GuildId, MessageId, UserId};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn message(content: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId(900),
            channel_id: ChannelId(20),
            guild_id: Some(GuildId(10)),
            author: ChatUser {
                id: UserId(5),
                name: "danny".to_string(),
                tag: "danny#0420".to_string(),
                bot: false,
            },
            content: content.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 10, 1, 18, 0, 0).unwrap(),
            reactions: vec![],
            attachments: vec![],
            referenced_message: None,
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: std::time::Duration::from_millis(1),
            factor: 1.6,
        }
    }

    #[test]
    fn test_header_has_seventeen_columns() {
        assert_eq!(HEADER.len(), 17);
        assert_eq!(HEADER[0], "Timestamp");
        assert_eq!(HEADER[16], "Message ID");
    }

    #[test]
    fn test_row_from_structured_bet() {
        let msg = message("DH danny Lakers ML -110 $2.00 Returns $3.80");
        let bet = BetParser::default().parse(&msg.content);
        let row = ReportRow::for_message(EventKind::Placed, &msg, "bets", bet.as_ref());
        let cells = row.to_cells();

        assert_eq!(cells.len(), HEADER.len());
        assert_eq!(cells[1], "placed");
        assert_eq!(cells[2], "individual");
        assert_eq!(cells[3], "DH");
        assert_eq!(cells[4], "danny");
        assert_eq!(cells[5], "Lakers ML");
        assert_eq!(cells[6], "-110");
        assert_eq!(cells[7], "2.00");
        assert_eq!(cells[8], "3.80");
        assert_eq!(cells[9], "");
        assert_eq!(cells[11], "bets");
        assert_eq!(cells[13], "danny#0420");
        assert_eq!(cells[14], "5");
        assert_eq!(cells[15], "https://discord.com/channels/10/20/900");
        assert_eq!(cells[16], "900");
    }

    #[test]
    fn test_row_falls_back_to_loose_amounts() {
        let msg = message("lakers ml gb $4 Returns $7.60");
        let row = ReportRow::for_message(EventKind::Win, &msg, "bets", None);

        assert_eq!(row.kind, None);
        assert_eq!(row.stake, Some(dec!(4)));
        assert_eq!(row.returns_amount, Some(dec!(7.60)));
        assert!(row.initials.is_empty());
    }

    #[test]
    fn test_row_settlement_columns() {
        let msg = message("DH danny Lakers ML -110 $2.00 Returns $3.80");
        let row = ReportRow::for_message(EventKind::Cashout, &msg, "bets", None)
            .with_settlement(dec!(1.5), Some(dec!(-0.5)));
        let cells = row.to_cells();
        assert_eq!(cells[9], "1.50");
        assert_eq!(cells[10], "-0.50");
    }

    #[test]
    fn test_null_sink_accepts_rows() {
        let row = ReportRow::for_message(EventKind::Placed, &message("x Returns $1"), "bets", None);
        tokio_test::assert_ok!(tokio_test::block_on(NullSink.append(&row)));
    }

    #[test]
    fn test_retry_delays_grow() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1).as_millis(), 400);
        assert_eq!(policy.delay_after(2).as_millis(), 640);
        assert_eq!(policy.delay_after(3).as_millis(), 1024);
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let huge = RetryPolicy {
            factor: 1e300,
            ..RetryPolicy::default()
        };
        assert_eq!(huge.delay_after(4), MAX_RETRY_DELAY);

        let nan = RetryPolicy {
            factor: f64::NAN,
            ..RetryPolicy::default()
        };
        assert_eq!(nan.delay_after(2), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_cutoff_applies_to_original_timestamp() {
        let cutoff = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        let dispatcher = ReportDispatcher::new(Arc::new(NullSink), Some(cutoff), RetryPolicy::default());

        assert!(dispatcher.should_report(cutoff));
        assert!(dispatcher.should_report(cutoff + ChronoDuration::days(1)));
        assert!(!dispatcher.should_report(cutoff - ChronoDuration::seconds(1)));
        assert!(ReportDispatcher::disabled().should_report(cutoff - ChronoDuration::days(999)));
    }

    #[tokio::test]
    async fn test_append_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut sink = MockReportSink::new();
        sink.expect_append().times(3).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(BotError::Api { status: 503, body: "backend".into() })
            } else {
                Ok(())
            }
        });

        let row = ReportRow::for_message(EventKind::Placed, &message("x Returns $1"), "bets", None);
        assert!(append_with_retry(&sink, &row, fast_policy(5)).await);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_append_gives_up_after_max_attempts() {
        let mut sink = MockReportSink::new();
        sink.expect_append()
            .times(5)
            .returning(|_| Err(BotError::Api { status: 429, body: "quota".into() }));

        let row = ReportRow::for_message(EventKind::Placed, &message("x Returns $1"), "bets", None);
        assert!(!append_with_retry(&sink, &row, fast_policy(5)).await);
    }

    #[tokio::test]
    async fn test_append_stops_on_permanent_error() {
        let mut sink = MockReportSink::new();
        sink.expect_append()
            .times(1)
            .returning(|_| Err(BotError::Api { status: 403, body: "forbidden".into() }));

        let row = ReportRow::for_message(EventKind::Placed, &message("x Returns $1"), "bets", None);
        assert!(!append_with_retry(&sink, &row, fast_policy(5)).await);
    }

    #[tokio::test]
    async fn test_dispatch_skips_before_cutoff() {
        let mut sink = MockReportSink::new();
        sink.expect_append().never();
        let cutoff = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let dispatcher = ReportDispatcher::new(Arc::new(sink), Some(cutoff), fast_policy(5));

        let msg = message("x Returns $1");
        let row = ReportRow::for_message(EventKind::Placed, &msg, "bets", None);
        assert!(dispatcher.dispatch(msg.timestamp, row).is_none());
    }

    #[tokio::test]
    async fn test_dispatch_runs_in_background() {
        let mut sink = MockReportSink::new();
        sink.expect_append().times(1).returning(|_| Ok(()));
        let dispatcher = ReportDispatcher::new(Arc::new(sink), None, fast_policy(5));

        let msg = message("x Returns $1");
        let row = ReportRow::for_message(EventKind::Void, &msg, "bets", None);
        let handle = dispatcher.dispatch(msg.timestamp, row).unwrap();
        assert!(handle.await.unwrap());
    }
}
