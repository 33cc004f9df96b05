use dioxus::prelude::*;
use fleetdeck_shared::NotificationKind;

use crate::components::ui::{Button, ButtonVariant};
use crate::notifications::Notification;
use crate::providers::use_notifications;

fn kind_accent(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Info => "border-sky-500",
        NotificationKind::Success => "border-emerald-500",
        NotificationKind::Warning => "border-amber-500",
        NotificationKind::Error => "border-rose-500",
    }
}

/// Notification list with unread badge and per-item actions.
#[component]
pub fn NotificationCenter() -> Element {
    let notifications = use_notifications();
    let items = notifications.list();
    let unread = notifications.unread_count();

    let store = notifications.store.clone();
    let mark_all = move |_| {
        store.mark_all_as_read();
    };

    rsx! {
        section { class: "w-96 rounded-lg bg-slate-800 text-slate-100 shadow-lg",
            header { class: "flex items-center justify-between border-b border-slate-700 px-4 py-3",
                h2 { class: "text-sm font-semibold", "Notifications" }
                div { class: "flex items-center gap-2",
                    if unread > 0 {
                        span { class: "rounded-full bg-rose-600 px-2 py-0.5 text-xs font-bold", "{unread}" }
                    }
                    Button {
                        variant: ButtonVariant::Subtle,
                        disabled: unread == 0,
                        onclick: mark_all,
                        "Mark all read"
                    }
                }
            }
            if items.is_empty() {
                p { class: "px-4 py-6 text-center text-xs text-slate-400", "You're all caught up" }
            } else {
                ul { class: "max-h-[28rem] divide-y divide-slate-700 overflow-y-auto",
                    for item in items {
                        NotificationRow { key: "{item.id}", item: item.clone() }
                    }
                }
            }
        }
    }
}

#[component]
fn NotificationRow(item: Notification) -> Element {
    let notifications = use_notifications();
    let accent = kind_accent(item.kind);
    let weight = if item.read { "opacity-60" } else { "" };
    let time = item.created_at.format("%H:%M").to_string();

    let read_store = notifications.store.clone();
    let read_id = item.id.clone();
    let dismiss_store = notifications.store.clone();
    let dismiss_id = item.id.clone();

    rsx! {
        li { class: "flex gap-3 border-l-4 {accent} px-4 py-3 {weight}",
            div { class: "flex-1",
                div { class: "flex items-baseline justify-between",
                    span { class: "text-sm font-medium", "{item.title}" }
                    span { class: "text-[10px] text-slate-400", "{time}" }
                }
                p { class: "mt-1 text-xs text-slate-300", "{item.message}" }
            }
            div { class: "flex flex-col gap-1",
                if !item.read {
                    Button {
                        variant: ButtonVariant::Subtle,
                        title: "Mark as read",
                        onclick: move |_| {
                            read_store.mark_as_read(&read_id);
                        },
                        "✓"
                    }
                }
                Button {
                    variant: ButtonVariant::Danger,
                    title: "Dismiss",
                    onclick: move |_| {
                        dismiss_store.remove(&dismiss_id);
                    },
                    "✕"
                }
            }
        }
    }
}
