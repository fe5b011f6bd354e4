use satt_core::{AttenuatorKind, ChannelMap, reset_all_faults};
use satt_hardware::SimChannels;
use satt_traits::SignalValue;

#[test]
fn issues_two_commands_per_blade() {
    let map = ChannelMap::build(AttenuatorKind::At2l0, "AT2L0:XTES", None).unwrap();
    let blades = map.reset_channels();
    let mut sink = SimChannels::new();
    let issued = reset_all_faults(&mut sink, &blades);

    assert_eq!(issued.len(), 2 * 19);
    assert!(issued.iter().all(|c| c.value == SignalValue::Int(1) && c.accepted));
    assert_eq!(issued[0].channel, "AT2L0:XTES:MMS:01:PLC:bReset");
    assert_eq!(issued[1].channel, "AT2L0:XTES:MMS:01:STATE:RESET");
    assert_eq!(sink.put_history().len(), 38);
}

#[test]
fn rejected_put_does_not_stop_the_rest() {
    let map = ChannelMap::build(AttenuatorKind::At2l0, "AT2L0:XTES", None).unwrap();
    let blades = map.reset_channels();
    let mut sink = SimChannels::new();
    sink.mark_read_only("AT2L0:XTES:MMS:05:STATE:RESET");

    let issued = reset_all_faults(&mut sink, &blades);
    assert_eq!(issued.len(), 38);
    let rejected: Vec<_> = issued.iter().filter(|c| !c.accepted).collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].channel, "AT2L0:XTES:MMS:05:STATE:RESET");
    assert_eq!(sink.put_history().len(), 37);
}

#[test]
fn no_blades_no_commands() {
    let mut sink = SimChannels::new();
    assert!(reset_all_faults(&mut sink, &[]).is_empty());
}
