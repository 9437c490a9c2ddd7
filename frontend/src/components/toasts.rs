use crate::{Model, Msg, Toast, ToastKind};
use yew::html::Scope;
use yew::prelude::*;

pub fn render_toasts(toasts: &[Toast], link: &Scope<Model>) -> Html {
    if toasts.is_empty() {
        return html! {};
    }
    html! {
        <div class="toast-stack">
            { for toasts.iter().map(|toast| {
                let id = toast.id;
                let (class, icon) = match toast.kind {
                    ToastKind::Success => ("toast success", "fa-solid fa-circle-check"),
                    ToastKind::Error => ("toast error", "fa-solid fa-circle-exclamation"),
                    ToastKind::Info => ("toast info", "fa-solid fa-circle-info"),
                };
                html! {
                    <div {class} key={id.to_string()} onclick={link.callback(move |_| Msg::DismissToast(id))}>
                        <i class={icon}></i>
                        <p>{ &toast.message }</p>
                    </div>
                }
            }) }
        </div>
    }
}
