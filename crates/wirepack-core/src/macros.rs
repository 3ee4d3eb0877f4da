/// Declare a packet type from an ordered field table.
///
/// Each field is `name: "code" = default`. The optional byte order after the
/// struct name is one of `Big`, `Little`, `Network` or `Native`; the default
/// is `Big`. The generated struct implements [`PacketType`](crate::PacketType),
/// dereferences to [`Packet`](crate::Packet) and gets one read-only accessor
/// per field. Fields are assigned through `Packet::set`.
///
/// The layout is derived on first use and cached for the life of the process.
/// A table that does not derive reports the same `PacketError::Layout` from
/// every constructor.
///
/// # Examples
/// ```
/// use wirepack_core::{PacketType, Value, packet_type};
///
/// packet_type! {
///     pub struct Udp: Network {
///         sport: "H" = 0xdead,
///         dport: "H" = 0,
///         ulen: "H" = 8,
///         sum: "H" = 0,
///     }
/// }
///
/// let udp = Udp::from_bytes(b"\x00\x35\x04\xd2\x00\x0b\x00\x00abc")?;
/// assert_eq!(udp.dport(), &Value::UInt(1234));
/// assert_eq!(udp.payload().as_bytes(), Some(&b"abc"[..]));
/// assert_eq!(format!("{udp:?}"), "Udp(sport=53, dport=1234, ulen=11, payload=b\"abc\")");
/// # Ok::<(), wirepack_core::PacketError>(())
/// ```
#[macro_export]
macro_rules! packet_type {
    (@byte_order) => {
        $crate::ByteOrder::Big
    };
    (@byte_order $order:ident) => {
        $crate::ByteOrder::$order
    };
    (@accessors [$index:expr]) => {};
    (@accessors [$index:expr] $field:ident $(, $rest:ident)*) => {
        pub fn $field(&self) -> &$crate::Value {
            &self.0.values()[$index]
        }

        $crate::packet_type!(@accessors [$index + 1] $($rest),*);
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(: $order:ident)? {
            $($field:ident : $code:literal = $default:expr),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq)]
        $vis struct $name($crate::Packet);

        impl $crate::PacketType for $name {
            fn layout() -> ::std::result::Result<
                &'static ::std::sync::Arc<$crate::Layout>,
                $crate::PacketError,
            > {
                static LAYOUT: ::std::sync::OnceLock<
                    ::std::result::Result<::std::sync::Arc<$crate::Layout>, $crate::PacketError>,
                > = ::std::sync::OnceLock::new();
                LAYOUT
                    .get_or_init(|| {
                        let specs: ::std::vec::Vec<$crate::FieldSpec> = ::std::vec![
                            $($crate::FieldSpec::new(::std::stringify!($field), $code, $default)),*
                        ];
                        $crate::Layout::derive(
                            ::std::stringify!($name),
                            $crate::packet_type!(@byte_order $($order)?),
                            specs,
                        )
                        .map(::std::sync::Arc::new)
                    })
                    .as_ref()
                    .map_err(::std::clone::Clone::clone)
            }

            fn wrap(packet: $crate::Packet) -> Self {
                Self(packet)
            }

            fn as_packet(&self) -> &$crate::Packet {
                &self.0
            }

            fn into_packet(self) -> $crate::Packet {
                self.0
            }
        }

        impl $name {
            $crate::packet_type!(@accessors [0usize] $($field),*);
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::Packet;

            fn deref(&self) -> &$crate::Packet {
                &self.0
            }
        }

        impl ::std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut $crate::Packet {
                &mut self.0
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Debug::fmt(&self.0, f)
            }
        }

        impl ::std::convert::From<$name> for $crate::Packet {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl ::std::convert::From<$name> for $crate::Payload {
            fn from(value: $name) -> Self {
                $crate::Payload::Nested(::std::boxed::Box::new(value.0))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{ByteOrder, Packet, PacketError, PacketType, Value};

    packet_type! {
        struct Eth {
            dst: "6s" = [0u8; 6],
            src: "6s" = [0u8; 6],
            ether_type: "H" = 0x0800,
        }
    }

    packet_type! {
        struct Pair: Little {
            pair: "2H" = (1u16, 2u16),
        }
    }

    packet_type! {
        struct Broken {
            a: "B" = 300,
        }
    }

    packet_type! {
        struct Nothing {}
    }

    #[test]
    fn layout_is_derived_once() {
        let first = Eth::layout().unwrap();
        let second = Eth::layout().unwrap();
        assert!(std::sync::Arc::ptr_eq(first, second));
        assert_eq!(first.format(), ">6s6sH");
        assert_eq!(first.name(), "Eth");
        assert_eq!(Pair::layout().unwrap().byte_order(), ByteOrder::Little);
    }

    #[test]
    fn accessors_follow_declared_order() {
        let eth = Eth::with_fields([("ether_type", 0x86ddu16)]).unwrap();
        assert_eq!(eth.ether_type(), &Value::UInt(0x86dd));
        assert_eq!(eth.dst(), &Value::Bytes(vec![0; 6]));
        assert_eq!(eth.header_len(), 14);
    }

    #[test]
    fn tuple_default_packs_little_endian() {
        let pair = Pair::new().unwrap();
        assert_eq!(pair.pack().unwrap(), vec![1, 0, 2, 0]);
        assert_eq!(pair.pair(), &Value::tuple([1u16, 2]));
    }

    #[test]
    fn broken_table_fails_every_time() {
        let first = Broken::new().unwrap_err();
        let second = Broken::from_bytes(&[1]).unwrap_err();
        assert!(matches!(first, PacketError::Layout { .. }));
        assert_eq!(first, second);
    }

    #[test]
    fn empty_table_has_empty_header() {
        let packet = Nothing::from_bytes(b"abc").unwrap();
        assert_eq!(packet.header_len(), 0);
        assert_eq!(packet.payload().as_bytes(), Some(&b"abc"[..]));
    }

    #[test]
    fn typed_payload_round_trip() {
        let mut eth = Eth::new().unwrap();
        eth.set_payload(Pair::new().unwrap());
        let bytes = eth.pack().unwrap();
        assert_eq!(bytes.len(), 18);

        let mut decoded = Eth::from_bytes(&bytes).unwrap();
        decoded.decode_payload_as::<Pair>().unwrap();
        let inner = decoded.payload().as_packet().unwrap().clone();
        let pair = Pair::try_from_packet(inner).unwrap();
        assert_eq!(pair.pair(), &Value::tuple([1u16, 2]));
    }

    #[test]
    fn try_from_packet_rejects_other_layouts() {
        let packet: Packet = Eth::new().unwrap().into();
        let back = Pair::try_from_packet(packet).unwrap_err();
        assert_eq!(back.name(), "Eth");
    }
}
