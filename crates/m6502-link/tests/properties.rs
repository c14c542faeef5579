//! Round-trip properties of the codec and the state calls.

use m6502_link::{Link, Pins, RegisterArgs};
use proptest::prelude::*;

fn any_pins() -> impl Strategy<Value = Pins> {
    (any::<[bool; 6]>(), any::<u16>(), any::<u8>()).prop_map(
        |([irq, nmi, rdy, res, rw, sync], address, data)| Pins {
            irq,
            nmi,
            rdy,
            res,
            rw,
            sync,
            address,
            data,
        },
    )
}

fn in_range_args() -> impl Strategy<Value = RegisterArgs> {
    (any::<u16>(), any::<[u8; 5]>()).prop_map(|(pc, [a, x, y, s, p])| RegisterArgs {
        pc: pc.into(),
        a: a.into(),
        x: x.into(),
        y: y.into(),
        s: s.into(),
        p: p.into(),
    })
}

proptest! {
    #[test]
    fn pins_decode_inverts_encode(pins in any_pins()) {
        prop_assert_eq!(Pins::decode(pins.encode()), pins);
    }

    #[test]
    fn pin_words_fit_the_host_integer(pins in any_pins()) {
        prop_assert!(i64::try_from(pins.encode()).is_ok());
    }

    #[test]
    fn set_state_then_get_state(args in in_range_args()) {
        let mut link = Link::new();
        link.create_instance(1);
        prop_assert_eq!(link.set_state(1, args), Ok(()));
        let state = link.get_state(1).unwrap();
        prop_assert_eq!(RegisterArgs::from(state.register), args);
    }

    #[test]
    fn rejected_set_state_changes_nothing(
        args in in_range_args(),
        bad in 0x100i64..0x1_0000,
        field in 1usize..6,
    ) {
        let mut link = Link::new();
        link.create_instance(1);
        link.set_state(1, args).unwrap();

        let mut wrong = args;
        match field {
            1 => wrong.a = bad,
            2 => wrong.x = bad,
            3 => wrong.y = bad,
            4 => wrong.s = bad,
            _ => wrong.p = bad,
        }
        prop_assert!(link.set_state(1, wrong).is_err());
        prop_assert_eq!(RegisterArgs::from(link.get_state(1).unwrap().register), args);
    }
}
