//! `component_proxy!` — a static, compile-time alternative to the dynamic
//! property-intercepting proxy in the JS source (SPEC_FULL.md §9, resolved
//! open question). Each invocation generates one struct wrapping a
//! [`crate::guest::GuestClient`], with a typed async method per RPC call,
//! a subscription method per inbound event, and an emit method per
//! outbound notification — all transparently prefixed `"<component>."`.
//!
//! ```ignore
//! component_proxy! {
//!     pub struct ChatProxy("Chat") {
//!         calls {
//!             async fn send_message(&self, params: Params) => "sendMessage";
//!         }
//!         events {
//!             fn on_message_received => "messageReceived";
//!         }
//!         notifications {
//!             async fn emit_typing(&self, params: Params) => "typing";
//!         }
//!     }
//! }
//! ```

#[macro_export]
macro_rules! component_proxy {
    (
        $(#[$struct_meta:meta])*
        $vis:vis struct $struct_name:ident($component:literal) {
            calls {
                $(
                    $(#[$call_meta:meta])*
                    $call_vis:vis async fn $call_fn:ident(&self, params: Params) => $call_method:literal;
                )*
            }
            events {
                $(
                    $(#[$ev_meta:meta])*
                    $ev_vis:vis fn $on_fn:ident => $event_name:literal;
                )*
            }
            notifications {
                $(
                    $(#[$n_meta:meta])*
                    $n_vis:vis async fn $emit_fn:ident(params: Params) => $n_event:literal;
                )*
            }
        }
    ) => {
        $(#[$struct_meta])*
        $vis struct $struct_name {
            guest: ::std::sync::Arc<$crate::guest::GuestClient>,
        }

        impl $struct_name {
            /// Wrap an already-constructed guest client. Call [`Self::load`]
            /// before any method below — the host must instantiate the
            /// component via `LoadComponents` first.
            pub fn new(guest: ::std::sync::Arc<$crate::guest::GuestClient>) -> Self {
                Self { guest }
            }

            pub async fn load(&self) -> ::std::result::Result<(), $crate::error::RemoteError> {
                self.guest.load_component($component).await
            }

            $(
                $(#[$call_meta])*
                $call_vis async fn $call_fn(
                    &self,
                    params: $crate::message::Params,
                ) -> ::std::result::Result<::serde_json::Value, $crate::error::RemoteError> {
                    self.guest
                        .call(::std::concat!($component, ".", $call_method), params)
                        .await
                }
            )*

            $(
                $(#[$ev_meta])*
                $ev_vis fn $on_fn(
                    &self,
                    listener: $crate::event::Listener,
                ) -> $crate::event::ListenerId {
                    self.guest
                        .on(::std::concat!($component, ".", $event_name), listener)
                }
            )*

            $(
                $(#[$n_meta])*
                $n_vis async fn $emit_fn(&self, params: $crate::message::Params) {
                    self.guest
                        .notify(::std::concat!($component, ".", $n_event), params)
                        .await
                }
            )*
        }
    };
}
